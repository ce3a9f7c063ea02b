//! GPG key import into the APT trusted keyring directory.
//!
//! Keys arrive in one of two shapes: full ASCII-armored key material, or a
//! bare key ID. Material is validated, dearmored with `gpg --dearmor`, and
//! written to `trusted.gpg.d/<fingerprint>.gpg` so apt picks it up without
//! the deprecated `apt-key`. A bare ID is fetched from the keyserver over
//! HTTPS first; that path only verifies transport, not the key itself, so
//! prefer passing full key material.

use std::fs;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::context::AptContext;
use crate::error::RsaptError;
use crate::executor::CommandSpec;
use crate::proxy::{ProxyScheme, proxy_settings};
use crate::release::Series;

const ARMOR_BEGIN: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----";
const ARMOR_END: &str = "-----END PGP PUBLIC KEY BLOCK-----";

/// Marker gpg prints on stderr when fed garbage.
const GPG_NO_VALID_DATA: &str = "gpg: no valid OpenPGP data found.";

/// 40-hex-digit fingerprint as printed by gpg 2.x `show-only` output.
static FINGERPRINT_V2: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9A-F]{40})").unwrap());

/// Ten groups of four hex digits as printed by gpg 1.x `--with-fingerprint`
/// (`Key fingerprint = 35F7 7D63 ... B4E6`).
static FINGERPRINT_V1: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9A-F]{4}\s+){10}").unwrap());

/// Imports a GPG key into the APT trusted keyring directory.
///
/// Input containing a dash or a newline is treated as key material and must
/// carry the ASCII armor BEGIN/END markers; anything else is treated as a
/// key ID and fetched from the configured keyserver.
///
/// In dry-run mode the gpg/curl invocations report no exit status and the
/// import is skipped after logging.
pub fn import_key(ctx: &AptContext, key: &str) -> anyhow::Result<()> {
    let key = key.trim();

    if key.contains('-') || key.contains('\n') {
        debug!("PGP key found (looks like ASCII armor format)");
        if !(key.contains(ARMOR_BEGIN) && key.contains(ARMOR_END)) {
            return Err(
                RsaptError::GpgKey("ASCII armor markers missing from GPG key".to_string()).into()
            );
        }

        let Some(fingerprint) = fingerprint_for(ctx, key.as_bytes())? else {
            info!("dry run: skipping key import");
            return Ok(());
        };
        let Some(dearmored) = dearmor(ctx, key.as_bytes())? else {
            info!("dry run: skipping key import");
            return Ok(());
        };
        write_keyring_file(ctx, &fingerprint, &dearmored)?;
    } else {
        warn!("PGP key found (looks like a key ID)");
        warn!("importing PGP key from keyserver; full key material not provided");
        validate_key_id(key)?;

        let Some(armored) = fetch_key_by_id(ctx, key)? else {
            info!("dry run: skipping key import");
            return Ok(());
        };
        let Some(dearmored) = dearmor(ctx, &armored)? else {
            info!("dry run: skipping key import");
            return Ok(());
        };
        write_keyring_file(ctx, key, &dearmored)?;
    }
    Ok(())
}

/// Extracts the 40-digit fingerprint from armored or binary key material.
///
/// gpg 1.x and 2.x print fingerprints differently; hosts at or after bionic
/// carry gpg 2.x. Returns `None` in dry-run mode.
fn fingerprint_for(ctx: &AptContext, key_material: &[u8]) -> anyhow::Result<Option<String>> {
    let gpgv2 = ctx.host_release()?.is_at_least(Series::Bionic);
    let args = if gpgv2 {
        vec!["--import-options".to_string(), "show-only".to_string()]
    } else {
        vec!["--with-fingerprint".to_string()]
    };

    let spec = CommandSpec::new("gpg", args);
    let output = ctx.executor().capture(&spec, Some(key_material))?;
    if output.stderr.contains(GPG_NO_VALID_DATA) {
        return Err(RsaptError::GpgKey("invalid GPG key material provided".to_string()).into());
    }
    if output.status.is_none() {
        return Ok(None);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let fingerprint = if gpgv2 {
        FINGERPRINT_V2
            .find(&stdout)
            .map(|m| m.as_str().to_string())
    } else {
        FINGERPRINT_V1
            .find(&stdout)
            .map(|m| m.as_str().split_whitespace().collect::<String>())
    };

    match fingerprint {
        Some(fingerprint) => Ok(Some(fingerprint)),
        None => Err(RsaptError::GpgKey(
            "cannot extract fingerprint from GPG key material".to_string(),
        )
        .into()),
    }
}

/// Fetches armored key material for a key ID from the keyserver via curl.
///
/// 8-, 16-, and 40-digit IDs are accepted; longer IDs are more resistant to
/// fingerprint collisions. Proxy settings from the environment are passed
/// through to curl. Returns `None` in dry-run mode.
fn fetch_key_by_id(ctx: &AptContext, key_id: &str) -> anyhow::Result<Option<Vec<u8>>> {
    let mut url = ctx.keyserver().clone();
    url.set_path("/pks/lookup");
    url.query_pairs_mut()
        .append_pair("op", "get")
        .append_pair("options", "mr")
        .append_pair("exact", "on")
        .append_pair("search", &format!("0x{}", key_id));

    let spec = CommandSpec::new("curl", vec![url.to_string()])
        .with_envs(proxy_settings(&[ProxyScheme::Https]));

    let output = ctx.executor().capture(&spec, None)?;
    if output.status.is_none() {
        return Ok(None);
    }
    if !output.success() {
        return Err(RsaptError::GpgKey(format!(
            "failed to fetch key {} from {}: {}",
            key_id,
            ctx.keyserver(),
            output.stderr.trim(),
        ))
        .into());
    }
    Ok(Some(output.stdout))
}

/// Converts armored key material to the binary keyring format.
///
/// Returns `None` in dry-run mode.
fn dearmor(ctx: &AptContext, key_material: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
    let spec = CommandSpec::new("gpg", vec!["--dearmor".to_string()]);
    let output = ctx.executor().capture(&spec, Some(key_material))?;

    if output.stderr.contains(GPG_NO_VALID_DATA) {
        return Err(RsaptError::GpgKey(
            "invalid GPG key material. Check your network setup (MTU, routing, DNS) \
             and/or proxy server settings as well as destination keyserver status."
                .to_string(),
        )
        .into());
    }
    if output.status.is_none() {
        return Ok(None);
    }
    if !output.success() {
        return Err(RsaptError::GpgKey(format!(
            "gpg --dearmor failed: {}",
            output.stderr.trim()
        ))
        .into());
    }
    Ok(Some(output.stdout))
}

/// Requires a key ID to be 8, 16, or 40 hex digits before it is used to
/// build a keyring file name.
fn validate_key_id(key_id: &str) -> Result<(), RsaptError> {
    let hex = key_id.chars().all(|c| c.is_ascii_hexdigit());
    if hex && matches!(key_id.len(), 8 | 16 | 40) {
        Ok(())
    } else {
        Err(RsaptError::GpgKey(format!(
            "invalid GPG key ID {:?}: expected 8, 16, or 40 hex digits",
            key_id
        )))
    }
}

/// Writes binary key material into `trusted.gpg.d/<name>.gpg`, creating the
/// directory when missing.
fn write_keyring_file(
    ctx: &AptContext,
    key_name: &str,
    key_material: &[u8],
) -> Result<(), RsaptError> {
    let dir = ctx.trusted_keyring_dir();
    fs::create_dir_all(&dir).map_err(|e| RsaptError::io(dir.to_string(), e))?;

    let path = dir.join(format!("{}.gpg", key_name));
    info!("writing {}", path);
    fs::write(&path, key_material).map_err(|e| RsaptError::io(path.to_string(), e))?;
    Ok(())
}
