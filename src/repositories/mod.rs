pub mod conversation_repo;
pub mod customer_repo;
pub mod message_repo;
pub mod store_repo;

pub use conversation_repo::ConversationRepository;
pub use customer_repo::CustomerRepository;
pub use message_repo::MessageRepository;
pub use store_repo::StoreRepository;
