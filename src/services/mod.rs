pub mod ai_engine;
pub mod channel;
pub mod escalation;
pub mod flow;
pub mod notifications;
pub mod pipeline;
pub mod responder;
pub mod signature;
pub mod store;
pub mod tagging;
pub mod tenant_resolver;

pub use ai_engine::{AiEngine, HttpAiEngine};
pub use channel::{ChannelSender, GraphApiSender, SenderAction};
pub use flow::{FlowContext, FlowInterceptor, FlowResult, OrderFlowInterceptor};
pub use notifications::{NotificationEvent, NotificationSink, PgNotificationSink};
pub use pipeline::{EventOutcome, WebhookPipeline};
pub use store::{ConversationStore, PgConversationStore};
pub use tagging::TaggingService;
pub use tenant_resolver::{ResolvedTenant, TenantResolver};
