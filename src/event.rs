use crate::assistant::{AssistantReply, FailureKind};

/// Events crossing from async tasks back onto the UI thread.
#[derive(Debug, Clone)]
pub enum AppEvent {
    AssistantReplied(AssistantReply),
    AssistantFailed(FailureKind),
}
