pub mod clock;
pub mod collab;
pub mod document;
pub mod filing;
pub mod matter;
pub mod novelty;
pub mod report;

pub use clock::{Clock, FixedClock, SystemClock};
pub use collab::{
    CollabError, Crm, DocumentSource, Fetched, Fields, FormSubmitter, Notifier, Unconfigured,
    UploadRequest, Uploaded, Uploader,
};
pub use document::{Document, EffectiveDate, sort_newest_first};
pub use filing::FilingProfile;
pub use matter::{
    FilingType, Matter, MatterStatus, UnknownFilingType, find_matter, normalize_application_number,
};
pub use novelty::{NovelBatch, is_novel, select_novel_batch};
pub use report::{MatterOutcome, MatterReport, RuntimeSnapshot, SweepReport, TargetedReport};
