//! Release asset selection per platform and architecture.
//!
//! Rules are tried in order and the first rule with any match wins. When a
//! rule matches several assets the lexicographically smallest name is
//! chosen, so the order of the release's asset list never matters.

use crate::update::checker::ReleaseAsset;
use crate::update::platform::Arch;

/// Name prefixes release tooling has used for this product's AppImages.
const PRODUCT_PREFIXES: [&str; 3] = ["potential potato", "potential.potato", "potential-potato"];

/// Kind of artifact an installation consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetTarget {
    /// `.dmg`, falling back to `.zip`.
    MacOs,
    /// Product `.AppImage` for the host architecture, falling back to any arch.
    LinuxAppImage,
    /// `.deb` for the host architecture.
    LinuxDeb,
    /// Setup `.exe`.
    Windows,
}

/// Returns `true` for this product's AppImage file names (any architecture).
pub fn is_product_appimage(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    PRODUCT_PREFIXES.iter().any(|p| lower.starts_with(p)) && lower.ends_with(".appimage")
}

fn ends_with_ci(name: &str, suffix: &str) -> bool {
    name.to_ascii_lowercase().ends_with(suffix)
}

fn first_matching_rule<'a>(
    assets: &'a [ReleaseAsset],
    rules: &[&dyn Fn(&ReleaseAsset) -> bool],
) -> Option<&'a ReleaseAsset> {
    rules.iter().find_map(|rule| {
        assets
            .iter()
            .filter(|a| rule(a))
            .min_by(|a, b| {
                a.name
                    .cmp(&b.name)
                    .then_with(|| a.browser_download_url.cmp(&b.browser_download_url))
            })
    })
}

/// Pick the installable asset for `target` on `arch`.
pub fn select_asset<'a>(
    assets: &'a [ReleaseAsset],
    target: AssetTarget,
    arch: &Arch,
) -> Option<&'a ReleaseAsset> {
    match target {
        AssetTarget::MacOs => first_matching_rule(
            assets,
            &[
                &|a: &ReleaseAsset| ends_with_ci(&a.name, ".dmg"),
                &|a: &ReleaseAsset| ends_with_ci(&a.name, ".zip"),
            ],
        ),
        AssetTarget::LinuxAppImage => {
            let token = arch.appimage_token();
            first_matching_rule(
                assets,
                &[
                    &|a: &ReleaseAsset| is_product_appimage(&a.name) && a.name.contains(token),
                    &|a: &ReleaseAsset| is_product_appimage(&a.name),
                ],
            )
        }
        AssetTarget::LinuxDeb => {
            let token = arch.deb_token();
            first_matching_rule(
                assets,
                &[&|a: &ReleaseAsset| ends_with_ci(&a.name, ".deb") && a.name.contains(token)],
            )
        }
        AssetTarget::Windows => first_matching_rule(
            assets,
            &[&|a: &ReleaseAsset| ends_with_ci(&a.name, ".exe") || a.name.contains("Setup.exe")],
        ),
    }
}
