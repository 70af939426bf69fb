//! Host platform and CPU architecture facts.

/// Operating system family the updater targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    /// Linux (AppImage or Debian package).
    Linux,
    /// macOS (disk image or zip opened by the user).
    MacOs,
    /// Windows (setup executable).
    Windows,
    /// Anything else; updates are unsupported.
    Other(String),
}

impl Platform {
    /// Platform of the running process.
    pub fn current() -> Self {
        Self::from_name(std::env::consts::OS)
    }

    /// Parse a platform name (`linux`, `macos`/`darwin`, `windows`/`win32`).
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "linux" => Self::Linux,
            "macos" | "darwin" => Self::MacOs,
            "windows" | "win32" => Self::Windows,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::MacOs => write!(f, "macos"),
            Self::Windows => write!(f, "windows"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// CPU architecture, normalised to the names release artifacts use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arch {
    /// 64-bit x86.
    X64,
    /// 64-bit ARM.
    Arm64,
    /// 32-bit ARM (hard float).
    Arm,
    /// Unrecognised; passed through unchanged.
    Other(String),
}

impl Arch {
    /// Architecture of the running process.
    pub fn current() -> Self {
        Self::from_name(std::env::consts::ARCH)
    }

    /// Parse an architecture name from either Rust or packaging conventions.
    pub fn from_name(name: &str) -> Self {
        match name {
            "x64" | "x86_64" | "amd64" => Self::X64,
            "arm64" | "aarch64" => Self::Arm64,
            "arm" | "armv7l" | "armhf" => Self::Arm,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Token found in AppImage (and generic) artifact names.
    pub fn appimage_token(&self) -> &str {
        match self {
            Self::X64 => "x86_64",
            Self::Arm64 => "arm64",
            Self::Arm => "armv7l",
            Self::Other(raw) => raw,
        }
    }

    /// Token found in `.deb` artifact names.
    pub fn deb_token(&self) -> &str {
        match self {
            Self::X64 => "amd64",
            Self::Arm64 => "arm64",
            Self::Arm => "armhf",
            Self::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::X64 => write!(f, "x64"),
            Self::Arm64 => write!(f, "arm64"),
            Self::Arm => write!(f, "arm"),
            Self::Other(raw) => write!(f, "{raw}"),
        }
    }
}
