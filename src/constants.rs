pub const MODULE_CATEGORIES: &[&str] = &[
    "Performance",
    "Battery",
    "Customization",
    "Audio",
    "Camera",
    "Connectivity",
    "Security",
    "Privacy",
    "Fonts",
    "Theming",
    "System",
    "Utilities",
    "Other",
];

pub const ROOT_METHODS: &[&str] = &["Magisk", "KernelSU", "KernelSU-Next", "APatch"];

pub const ANDROID_VERSIONS: &[&str] = &[
    "5.0", "5.1", "6.0", "7.0", "7.1", "8.0", "8.1", "9", "10", "11", "12", "12L", "13", "14",
    "15", "16",
];

pub mod api_keys {
    /// Every plaintext key starts with this marker.
    pub const KEY_PREFIX: &str = "rmk_";

    /// Number of random bytes after the marker (hex encoded, so twice as many chars).
    pub const KEY_RANDOM_BYTES: usize = 20;

    /// Length of the stored lookup prefix, marker included.
    pub const LOOKUP_PREFIX_LEN: usize = 12;

    pub const MAX_EXPIRY_DAYS: u32 = 365;
}

pub mod session {
    pub const USER_ID_KEY: &str = "user_id";
}

pub mod limits {
    pub const DEFAULT_PAGE_SIZE: usize = 20;

    pub const MAX_PAGE_SIZE: usize = 100;

    pub const MAX_FEATURES: usize = 20;

    pub const MAX_RELEASES_PER_SUBMISSION: usize = 20;

    pub const GITHUB_RELEASES_PER_PAGE: u32 = 30;
}
