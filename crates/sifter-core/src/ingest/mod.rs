mod chunk;
mod confidence;
mod detect;
mod extractor;
mod pipeline;
mod postprocess;
mod profile;
mod prompt;
mod response;
mod text;

pub use chunk::chunk_text;
pub use confidence::{
    assign_confidence, score_entity, score_relationship, EntityFeatures, EntityRule,
    RelationshipRule, ENTITY_RULES, RELATIONSHIP_RULES,
};
pub use detect::{detect_file_type, FileType};
pub use extractor::{
    extract_entities, ExtractionError, ExtractionOutcome, ExtractionRequest, ExtractionResult,
    DELEGATED_MODEL, DIRECT_IMPORT_MODEL,
};
pub use pipeline::{IngestError, IngestResult, Pipeline};
pub use postprocess::{
    name_similarity, post_process, title_case, PostProcessor, PromotionRule, MERGE_THRESHOLD,
    PROMOTION_THRESHOLD,
};
pub use profile::{
    FlatProfile, NestedEntity, NestedProfile, ProfileAttribute, ProfileAttributes,
    ProfileDocument, ProfileError, ProfileImport, ProfileName, ProfileRelationship,
    ProfileResult, DIRECT_IMPORT_CONFIDENCE,
};
pub use prompt::build_extraction_prompt;
pub use response::{parse_response, repair_truncated, ParsedResponse, ResponseError, ResponseResult};
pub use text::extract_text;
