//! Constants shared by the end-to-end suites.

pub const REQUEST_TIMEOUT_SECS: u64 = 10;

pub const SCH_SPOT: &str = "sch";
pub const SUNMOON_SPOT: &str = "sunmoon";

pub const SCH_ADMIN: &str = "admin_sch";
pub const SCH_PASS: &str = "sch_password_123";

pub const SUNMOON_ADMIN: &str = "admin_sunmoon";
pub const SUNMOON_PASS: &str = "sunmoon_password_123";
