//! Cheap, cloneable string identifiers.
//!
//! Device, room, peer and track identifiers are all opaque strings handed to
//! us by the browser or the real-time SDK. Each gets its own newtype so they
//! cannot be mixed up, and each uses `Arc<str>` internally so cloning is a
//! pointer copy.

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(std::sync::Arc<str>);

        impl $name {
            /// Creates a new identifier from a string.
            pub fn new(id: impl Into<std::sync::Arc<str>>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a physical capture device (camera or microphone).
    ///
    /// ```
    /// use meet_session::DeviceId;
    ///
    /// let cam = DeviceId::new("camA");
    /// assert_eq!(cam, DeviceId::from("camA"));
    /// assert_ne!(cam, DeviceId::from("camB"));
    /// ```
    DeviceId
);

string_id!(
    /// Identifier of a meeting room.
    RoomId
);

string_id!(
    /// Identifier of a remote participant, assigned by the SDK.
    PeerId
);

string_id!(
    /// Identifier of a remote media track, assigned by the SDK.
    TrackId
);

impl DeviceId {
    /// The id browsers use for "whatever the OS default is".
    pub fn system_default() -> Self {
        Self::new("default")
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::system_default()
    }
}
