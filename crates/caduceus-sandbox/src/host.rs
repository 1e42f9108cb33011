//! Names of the host surface the runtime exposes to WASM plugins.

/// Module the extism kernel functions are imported from.
pub const EXTISM_KERNEL_MODULE: &str = "extism:host/env";

/// Module user-defined host functions are imported from.
pub const HOST_USER_MODULE: &str = "extism:host/user";

/// Host function a guest calls to write a log line.
pub const HOST_LOG_FN: &str = "caduceus_log";

/// Host function a guest calls to read one of its plugin's secrets.
pub const HOST_SECRET_FN: &str = "caduceus_secret";

/// Every host function the runtime registers.
pub const HOST_FUNCTIONS: &[&str] = &[HOST_LOG_FN, HOST_SECRET_FN];

/// SDK packages native protocols may import.
pub const SDK_MODULES: &[&str] = &["caduceus.effects", "caduceus.events", "caduceus.protocols"];

/// WASI preview 1 module name.
pub const WASI_PREVIEW1_MODULE: &str = "wasi_snapshot_preview1";

/// WASI preview 1 functions a plugin built for `wasm32-wasip1` typically
/// needs for formatting, clocks and randomness. Filesystem and socket calls
/// are left out.
pub const WASI_PREVIEW1_FUNCTIONS: &[&str] = &[
    "fd_write",
    "environ_get",
    "environ_sizes_get",
    "proc_exit",
    "clock_time_get",
    "random_get",
];

/// Package names no plugin may take. A plugin's own package is importable
/// without an allow-list entry, so a plugin named after one of these would
/// reach host or system code.
pub const RESERVED_PACKAGES: &[&str] = &[
    "caduceus",
    "extism",
    "env",
    WASI_PREVIEW1_MODULE,
    "wasi_unstable",
    "builtins",
    "importlib",
    "os",
    "sys",
    "subprocess",
    "socket",
    "shutil",
    "signal",
    "ctypes",
    "multiprocessing",
];
