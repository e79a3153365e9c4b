pub mod ai;
pub mod conversation;
pub mod customer;
pub mod message;
pub mod outbound;
pub mod product;
pub mod tenant;
pub mod webhook;

pub use ai::{AiContext, AiReply, Intent, TagResult};
pub use conversation::{Conversation, ConversationStatus};
pub use customer::Customer;
pub use message::{MessageSender, StoredMessage};
pub use outbound::{OutboundMessage, ProductCard, QuickReplyOption};
pub use product::Product;
pub use tenant::{Channel, ChatbotSettings, Store};
pub use webhook::{EntryKind, MessagingEvent, VerifyParams, WebhookEnvelope, WebhookEntry};
