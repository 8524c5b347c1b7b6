// Booking commit client: roster of requested equipment, clash pre-check and the commit workflow

pub mod api;
pub mod booking_form;
pub mod clash_api;
pub mod clash_query;
pub mod config;
pub mod inventory;
pub mod roster;
pub mod telemetry;
pub mod view;
pub mod workflow;

// Re-export key types for convenience
pub use api::{ApiError, ClientError};
pub use booking_form::{
    parse_quantity_input, BookingForm, FieldError, FormMethod, FormSubmitter, HttpFormSubmitter,
    NativeSubmission, SubmitReceipt, SubmitTarget,
};
pub use clash_api::{ClashAuthority, ClashRecord, HttpClashAuthority};
pub use clash_query::{build_query, ClashQuery, QueryError, TimeSpec, TimeSpecInput};
pub use config::ClientConfig;
pub use inventory::{CatalogItem, InventoryClient, ItemUpdate, NewItem};
pub use roster::{ItemRoster, RosterEntry, RosterKind};
pub use view::{roster_rows, ClashReview, ReviewRow, RosterRow};
pub use workflow::{
    AttemptId, BookingWorkflow, ClashCheck, Outcome, PendingCheck, WorkflowError, WorkflowState,
    WorkflowStats,
};
