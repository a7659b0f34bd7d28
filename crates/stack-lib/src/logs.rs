//! Log groups for container log routing

/// How long a log group keeps events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionDays {
    OneDay,
}

impl RetentionDays {
    pub fn days(&self) -> u32 {
        match self {
            RetentionDays::OneDay => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogGroupDescriptor {
    pub retention: RetentionDays,
}
