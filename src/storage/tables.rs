use redb::TableDefinition;

/// Users: user_id -> User (bincode)
pub const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Unique email index: email -> user_id
pub const USER_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("user_emails");

/// Resources (all kinds): resource_id -> Resource (bincode)
pub const RESOURCES: TableDefinition<&str, &[u8]> = TableDefinition::new("resources");

/// Secondary index: owner_id -> Vec<resource_id> (for "my uploads" listings)
pub const OWNER_RESOURCES: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_resources");
