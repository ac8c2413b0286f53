//! Nominal id types.
//!
//! `sid`, `userId`, `callId`, and `roomId` are all opaque strings on the
//! wire but semantically distinct; these newtypes stop a userId from being
//! accidentally passed where a sid is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! nominal_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

nominal_id!(Sid);
nominal_id!(UserId);
nominal_id!(CallId);
nominal_id!(RoomId);

/// `room_<a>_<b>` with `a`, `b` in ascending lexicographic order, so the
/// name is identical regardless of argument order (law: room-name
/// canonicity).
pub fn sid_room_name(a: &Sid, b: &Sid) -> RoomId {
    let (lo, hi) = if a.as_str() <= b.as_str() { (a, b) } else { (b, a) };
    RoomId(format!("room_{}_{}", lo.as_str(), hi.as_str()))
}

/// Same canonicalization for the media-server room name, keyed by userId so
/// a user reconnecting with a new sid still rejoins the same media room.
pub fn user_room_name(a: &UserId, b: &UserId) -> String {
    let (lo, hi) = if a.as_str() <= b.as_str() { (a, b) } else { (b, a) };
    format!("room_{}_{}", lo.as_str(), hi.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_name_is_order_independent() {
        let a = Sid::from("s2");
        let b = Sid::from("s1");
        assert_eq!(sid_room_name(&a, &b), sid_room_name(&b, &a));
    }

    #[test]
    fn user_room_name_is_order_independent() {
        let a = UserId::from("u2");
        let b = UserId::from("u1");
        assert_eq!(user_room_name(&a, &b), user_room_name(&b, &a));
    }
}
