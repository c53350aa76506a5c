//! `.SRCINFO` rendering in makepkg's field order

use super::descriptor::PackageDescriptor;
use std::fmt::Write as _;

/// Name of the rendered metadata file
pub const SRCINFO_FILE: &str = ".SRCINFO";

const SINGLE_VALUED: &[&str] = &["pkgdesc", "pkgver", "pkgrel", "epoch", "url", "install", "changelog"];

const MULTI_VALUED: &[&str] = &[
  "arch",
  "groups",
  "license",
  "checkdepends",
  "makedepends",
  "depends",
  "optdepends",
  "provides",
  "conflicts",
  "replaces",
  "noextract",
  "options",
  "backup",
];

const ARCH_SPECIFIC: &[&str] = &[
  "provides",
  "conflicts",
  "depends",
  "replaces",
  "optdepends",
  "makedepends",
  "checkdepends",
];

/// Render the `.SRCINFO` text for a descriptor
pub fn render(descriptor: &PackageDescriptor) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "pkgbase = {}", descriptor.pkgbase);

  for name in SINGLE_VALUED {
    if let Some(value) = descriptor.field(name).into_iter().next() {
      write_attr(&mut out, name, &value);
    }
  }

  for name in MULTI_VALUED {
    for value in descriptor.field(name) {
      write_attr(&mut out, name, &value);
    }
  }
  for source in descriptor.sources.iter().filter(|s| s.arch.is_none()) {
    write_attr(&mut out, "source", &source.raw);
  }
  for key in &descriptor.validpgpkeys {
    write_attr(&mut out, "validpgpkeys", key);
  }
  write_checksums(&mut out, descriptor, None);

  for arch in descriptor.arch.iter().filter(|a| a.as_str() != "any") {
    let source_attr = format!("source_{}", arch);
    for source in descriptor.sources.iter().filter(|s| s.arch.as_ref() == Some(arch)) {
      write_attr(&mut out, &source_attr, &source.raw);
    }
    for base in ARCH_SPECIFIC {
      let name = format!("{}_{}", base, arch);
      for value in descriptor.field(&name) {
        write_attr(&mut out, &name, &value);
      }
    }
    write_checksums(&mut out, descriptor, Some(arch));
  }

  for pkgname in &descriptor.pkgnames {
    let _ = write!(out, "\npkgname = {}\n", pkgname);
  }

  out
}

fn write_checksums(out: &mut String, descriptor: &PackageDescriptor, arch: Option<&String>) {
  for field in descriptor.checksums.iter().filter(|c| c.arch.as_ref() == arch) {
    let name = field.field_name();
    for value in &field.values {
      write_attr(out, &name, value);
    }
  }
}

fn write_attr(out: &mut String, name: &str, value: &str) {
  // makepkg drops empty values and flattens embedded newlines
  let value = value.replace('\n', " ");
  let value = value.trim();
  if !value.is_empty() {
    let _ = writeln!(out, "\t{} = {}", name, value);
  }
}
