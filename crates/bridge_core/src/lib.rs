//! Bridge core: framing, wire types, prompt construction and response parsing.
//!
//! Everything here is synchronous and free of I/O.
mod content;
mod follow_up;
mod frame;
mod msg;
mod parse;
mod prompt;
mod template;

pub use content::{Comment, ContentKind, ExtractedContent, Reference};
pub use follow_up::{parse_follow_up, ClassifiedItem, FollowUpResult, ItemKind};
pub use frame::{encode_frame, FrameCodec, FrameError, LENGTH_PREFIX_LEN, MAX_FRAME_LEN};
pub use msg::{
    recover_request_id, ProgressMessage, ProgressStage, ProgressUpdate, Request, Response,
};
pub use parse::{
    extract_bullets, is_negative_result, match_references, normalize_url_for_dedupe,
    parse_response, CustomSection, ParsedResult, RelevantLink, SectionContent, CREATOR_PREFIX,
    EXTRACTION_FAILED_LEARNINGS, SUMMARY_FALLBACK_CHARS,
};
pub use prompt::{
    build_follow_up_prompt, build_prompt, estimate_tokens, truncate_chars, FollowUpInput,
    PromptInput, MAX_BODY_CHARS, NO_ACTION_ITEMS, NO_RELEVANT_LINKS, TRUNCATION_MARKER,
};
pub use template::{
    ActiveSection, BuiltinSection, OutputTemplate, Section, SectionFormat, SectionKind,
};
