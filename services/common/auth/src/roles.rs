/// Role embedded in tokens issued to registered customers.
pub const ROLE_CUSTOMER: &str = "user";
