//! Host functions exposed to WASM protocols under `extism:host/user`.

use std::sync::Arc;

use caduceus_core::{PluginName, ProtocolId};
use caduceus_sandbox::host::{HOST_LOG_FN, HOST_SECRET_FN};
use extism::{CurrentPlugin, Error, PluginBuilder, UserData, Val};

use crate::protocol::Secrets;

/// Maximum accepted length of a log level string.
const MAX_LEVEL_LEN: u64 = 64;

/// Maximum accepted length of a log message (64 KB).
const MAX_LOG_MESSAGE_LEN: u64 = 64 * 1024;

/// Maximum accepted length of a secret name (4 KB).
const MAX_KEY_LEN: u64 = 4 * 1024;

/// Per-instance state shared with host functions.
#[derive(Debug)]
pub(crate) struct HostState {
    pub(crate) plugin: PluginName,
    pub(crate) protocol: ProtocolId,
    pub(crate) secrets: Arc<Secrets>,
}

/// Register every host function on `builder`.
pub(crate) fn register_host_functions<'a>(
    builder: PluginBuilder<'a>,
    user_data: &UserData<HostState>,
) -> PluginBuilder<'a> {
    builder
        .with_function(
            HOST_LOG_FN,
            vec![extism::PTR, extism::PTR],
            vec![],
            user_data.clone(),
            caduceus_log_impl,
        )
        .with_function(
            HOST_SECRET_FN,
            vec![extism::PTR],
            vec![extism::PTR],
            user_data.clone(),
            caduceus_secret_impl,
        )
}

/// Read bytes from guest memory, refusing blocks larger than `limit`.
#[allow(clippy::cast_sign_loss)]
fn get_safe_bytes(plugin: &mut CurrentPlugin, val: &Val, limit: u64) -> Result<Vec<u8>, Error> {
    let ptr = match val {
        Val::I64(v) => *v as u64,
        Val::I32(v) => u64::from(*v as u32),
        _ => return Err(Error::msg("expected memory pointer value")),
    };

    let len = plugin.memory_length(ptr)?;
    if len > limit {
        return Err(Error::msg(format!(
            "guest block of {len} bytes exceeds the {limit} byte limit"
        )));
    }

    #[allow(clippy::cast_possible_wrap)]
    let safe_val = Val::I64(ptr as i64);
    plugin.memory_get_val(&safe_val)
}

fn identity(user_data: &UserData<HostState>) -> Result<(PluginName, ProtocolId), Error> {
    let ud = user_data.get()?;
    let state = ud
        .lock()
        .map_err(|e| Error::msg(format!("host state lock poisoned: {e}")))?;
    Ok((state.plugin.clone(), state.protocol.clone()))
}

/// `caduceus_log(level, message)`: record a guest log line.
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn caduceus_log_impl(
    plugin: &mut CurrentPlugin,
    inputs: &[Val],
    _outputs: &mut [Val],
    user_data: UserData<HostState>,
) -> Result<(), Error> {
    let level_bytes = get_safe_bytes(plugin, &inputs[0], MAX_LEVEL_LEN)?;
    let message_bytes = get_safe_bytes(plugin, &inputs[1], MAX_LOG_MESSAGE_LEN)?;
    let level = String::from_utf8_lossy(&level_bytes).to_lowercase();
    let message = String::from_utf8_lossy(&message_bytes);

    let (plugin_name, protocol) = identity(&user_data)?;

    match level.as_str() {
        "trace" => tracing::trace!(plugin = %plugin_name, protocol = %protocol, "{message}"),
        "debug" => tracing::debug!(plugin = %plugin_name, protocol = %protocol, "{message}"),
        "warn" | "warning" => {
            tracing::warn!(plugin = %plugin_name, protocol = %protocol, "{message}");
        },
        "error" | "err" => {
            tracing::error!(plugin = %plugin_name, protocol = %protocol, "{message}");
        },
        _ => tracing::info!(plugin = %plugin_name, protocol = %protocol, "{message}"),
    }

    Ok(())
}

/// `caduceus_secret(name) -> value`: a declared secret, or the empty string.
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn caduceus_secret_impl(
    plugin: &mut CurrentPlugin,
    inputs: &[Val],
    outputs: &mut [Val],
    user_data: UserData<HostState>,
) -> Result<(), Error> {
    let key_bytes = get_safe_bytes(plugin, &inputs[0], MAX_KEY_LEN)?;
    let key = String::from_utf8_lossy(&key_bytes);

    let ud = user_data.get()?;
    let state = ud
        .lock()
        .map_err(|e| Error::msg(format!("host state lock poisoned: {e}")))?;
    let value = state.secrets.get(key.as_ref()).cloned();
    if value.is_none() {
        tracing::debug!(
            plugin = %state.plugin,
            protocol = %state.protocol,
            secret = %key,
            "Guest requested an unset secret"
        );
    }
    drop(state);

    let result = value.unwrap_or_default();
    let mem = plugin.memory_new(&result)?;
    outputs[0] = plugin.memory_to_val(mem);
    Ok(())
}
