//! Rendering of the per-device `static-keys.c`.
//!
//! The file holds the device's private scalar, the root certificate and the
//! device's own certificate as C initialisers. Every byte array is laid out
//! in rows of 8, and the device class is written as the symbol the firmware
//! headers define rather than as a number.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::{
    cert::{Certificate, VALID_FOREVER},
    keystore::{PUBLIC_KEY_LEN, SCALAR_LEN},
};

/// Name of the generated file, both in the firmware tree and in `setup/`.
pub const STATIC_KEYS_FILE: &str = "static-keys.c";

const BANNER: &str =
    "/* Generated by trust-setup for a single device, do not edit. */";
const ROW: usize = 8;

/// The contents of one device's `static-keys.c`.
pub struct StaticKeys<'a> {
    pub private_scalar: [u8; SCALAR_LEN],
    pub root_cert: &'a Certificate,
    pub our_cert: &'a Certificate,
    pub generated_at: DateTime<Utc>,
}

impl<'a> StaticKeys<'a> {
    pub fn new(
        private_scalar: [u8; SCALAR_LEN],
        root_cert: &'a Certificate,
        our_cert: &'a Certificate,
    ) -> StaticKeys<'a> {
        StaticKeys {
            private_scalar,
            root_cert,
            our_cert,
            generated_at: Utc::now(),
        }
    }
}

impl fmt::Display for StaticKeys<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", BANNER)?;
        writeln!(
            f,
            "/* {} */",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(f)?;
        writeln!(f, "#include <stdint.h>")?;
        writeln!(f, "#include \"certificate.h\"")?;
        writeln!(f)?;

        writeln!(f, "const uint8_t our_privkey[{}] = {{", SCALAR_LEN)?;
        write_rows(f, 1, &self.private_scalar)?;
        writeln!(f, "}};")?;
        writeln!(f)?;
        write_certificate(f, "root_cert", self.root_cert)?;
        writeln!(f)?;
        write_certificate(f, "our_cert", self.our_cert)
    }
}

fn indent(f: &mut fmt::Formatter, level: usize) -> fmt::Result {
    write!(f, "{:width$}", "", width = level * 4)
}

/// Writes `bytes` as rows of 8 hex literals at `level`.
fn write_rows(f: &mut fmt::Formatter, level: usize, bytes: &[u8]) -> fmt::Result {
    for row in bytes.chunks(ROW) {
        indent(f, level)?;
        for (i, byte) in row.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "0x{:02x},", byte)?;
        }
        writeln!(f)?;
    }

    Ok(())
}

/// Writes `.name = { ... },` at `level`.
fn write_field(
    f: &mut fmt::Formatter,
    level: usize,
    name: &str,
    bytes: &[u8],
) -> fmt::Result {
    indent(f, level)?;
    writeln!(f, ".{} = {{", name)?;
    write_rows(f, level + 1, bytes)?;
    indent(f, level)?;
    writeln!(f, "}},")
}

fn write_certificate(
    f: &mut fmt::Formatter,
    name: &str,
    certificate: &Certificate,
) -> fmt::Result {
    let tbs = &certificate.tbs;
    let (x, y) = tbs.public_key.split_at(PUBLIC_KEY_LEN / 2);
    let (r, s) = certificate.signature_parts();

    writeln!(f, "const certificate_t {} = {{", name)?;
    writeln!(f, "    .serial_number = {},", tbs.serial)?;
    write_field(f, 1, "issuer", tbs.issuer.as_bytes())?;
    writeln!(f, "    .validity = {{")?;
    writeln!(f, "        .not_before = {},", tbs.valid_from)?;
    if tbs.valid_to == VALID_FOREVER {
        writeln!(f, "        .not_after = UINT32_MAX,")?;
    } else {
        writeln!(f, "        .not_after = {},", tbs.valid_to)?;
    }
    writeln!(f, "    }},")?;
    write_field(f, 1, "subject", tbs.subject.as_bytes())?;
    writeln!(f, "    .tags = {{")?;
    writeln!(
        f,
        "        .device_class = {},",
        tbs.tags.device_class.symbol()
    )?;
    writeln!(f, "    }},")?;
    writeln!(f, "    .public_key = {{")?;
    write_field(f, 2, "x", x)?;
    write_field(f, 2, "y", y)?;
    writeln!(f, "    }},")?;
    writeln!(f, "    .signature = {{")?;
    write_field(f, 2, "r", r)?;
    write_field(f, 2, "s", s)?;
    writeln!(f, "    }},")?;
    writeln!(f, "}};")
}
