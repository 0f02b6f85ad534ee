//! File-selection policy: literal substring semantics.

use nixipfs_core::policy::{NARINFO_FILES, NAR_FILES, RELEASE_FILES};
use rstest::rstest;

#[rstest]
#[case("nixexprs.tar.xz", true)]
#[case("nixexprs.tar.xz.tmp", true)]
#[case("git-revision", true)]
#[case("binary-cache-url", true)]
#[case("src-url", true)]
#[case("store-paths.xz", true)]
#[case("nixos-minimal-21.05.1234-x86_64-linux.iso", true)]
#[case("nixos-21.05-x86_64-linux.ova", true)]
#[case("nixos-minimal.iso.sha256", true)]
#[case("ipfs_hash", false)]
#[case("README", false)]
#[case("binary_cache", false)]
fn release_selection(#[case] filename: &str, #[case] selected: bool) {
    assert_eq!(RELEASE_FILES.selects(filename), selected, "{filename}");
}

#[rstest]
#[case("nixos-21.05.iso", true)]
#[case("nixos-21.05.ova", true)]
#[case("nixexprs.tar.xz", false)]
#[case("git-revision", false)]
#[case("store-paths.xz", false)]
fn release_cacheability(#[case] filename: &str, #[case] cacheable: bool) {
    assert_eq!(RELEASE_FILES.is_cacheable(filename), cacheable, "{filename}");
}

#[rstest]
#[case("0a1b2c.narinfo", true, true)]
#[case("nix-cache-info", false, false)]
fn narinfo_policy(#[case] filename: &str, #[case] selected: bool, #[case] cacheable: bool) {
    assert_eq!(NARINFO_FILES.selects(filename), selected);
    assert_eq!(NARINFO_FILES.is_cacheable(filename), cacheable);
}

#[rstest]
#[case("0a1b2c.nar.xz", true, true)]
#[case("0a1b2c.nar", true, true)]
#[case("nar-cache-info", true, false)]
#[case("nar", false, false)]
fn nar_policy(#[case] filename: &str, #[case] selected: bool, #[case] cacheable: bool) {
    assert_eq!(NAR_FILES.selects(filename), selected);
    assert_eq!(NAR_FILES.is_cacheable(filename), cacheable);
}
