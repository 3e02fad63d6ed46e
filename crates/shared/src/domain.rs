use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(MessageId);

/// Prefix carried by locally generated optimistic message ids. The server
/// never issues ids of this form, so a temporary id cannot collide with or
/// be mistaken for an authoritative one.
pub const TEMP_MESSAGE_ID_PREFIX: &str = "temp-";

impl MessageId {
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_MESSAGE_ID_PREFIX)
    }
}
