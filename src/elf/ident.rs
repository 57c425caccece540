use crate::{Error, Result};

/// This enum represents the `EI_CLASS` field of the ident bytes: whether the object uses the
/// 32-bit or the 64-bit file layout. An unrecognized class byte maps to [ElfClass::Invalid] and
/// fails the parse, because the layout of every later field depends on it.
#[repr(u8)]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
pub enum ElfClass {
    #[default]
    Invalid = 0,
    Class32 = 1,
    Class64 = 2,
}

impl From<u8> for ElfClass {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Class32,
            2 => Self::Class64,
            _ => Self::Invalid,
        }
    }
}

/// This enum represents the `EI_DATA` field of the ident bytes: the byte order all multi-byte
/// fields in the file are encoded with. An unrecognized encoding byte maps to
/// [ElfEndian::Invalid] and fails the parse.
#[repr(u8)]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
pub enum ElfEndian {
    #[default]
    Invalid = 0,
    Little = 1,
    Big = 2,
}

impl From<u8> for ElfEndian {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Little,
            2 => Self::Big,
            _ => Self::Invalid,
        }
    }
}

/// This enum represents the `EI_VERSION` byte. Only one format version (1) has ever been
/// assigned, so anything else collapses to the invalid variant.
#[repr(u8)]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
pub enum ElfVersion {
    Invalid = 0,
    #[default]
    Current = 1,
}

impl From<u8> for ElfVersion {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Current,
            _ => Self::Invalid,
        }
    }
}

/// This enum represents the `EI_OSABI` field of the ident bytes. Values outside the registered
/// set are preserved in the [ElfOsAbi::Unknown] variant so the original byte survives the
/// round-trip into the header feature vector.
#[repr(u8)]
#[rustfmt::skip]
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
pub enum ElfOsAbi {
    /// No extensions or unspecified
    #[default]
    Unspecified = 0x00,

    /// Hewlett-Packard HP-UX
    HP_UX       = 0x01,

    /// NetBSD
    NetBSD      = 0x02,

    /// GNU/Linux
    GNU         = 0x03,

    /// Sun Solaris
    Solaris     = 0x06,

    /// AIX
    AIX         = 0x07,

    /// IRIX
    Irix        = 0x08,

    /// FreeBSD
    FreeBSD     = 0x09,

    /// Compaq TRU64 UNIX
    Tru64       = 0x0A,

    /// Novell Modesto
    Modesto     = 0x0B,

    /// OpenBSD
    OpenBSD     = 0x0C,

    /// OpenVMS
    OpenVMS     = 0x0D,

    /// Hewlett-Packard Non-Stop Kernel
    NSK         = 0x0E,

    /// Amiga Research OS
    AROS        = 0x0F,

    /// The FenixOS highly scalable multi-core OS
    FenixOS     = 0x10,

    /// Nuxi CloudABI
    CloudABI    = 0x11,

    /// Stratus Technologies OpenVOS
    OpenVOS     = 0x12,

    /// Any unregistered OS ABI byte
    Unknown(u8) = 0x13,
}

impl ElfOsAbi {
    /// Returns the raw `EI_OSABI` byte this variant was parsed from.
    pub fn value(&self) -> u8 {
        match self {
            Self::Unspecified => 0x00,
            Self::HP_UX => 0x01,
            Self::NetBSD => 0x02,
            Self::GNU => 0x03,
            Self::Solaris => 0x06,
            Self::AIX => 0x07,
            Self::Irix => 0x08,
            Self::FreeBSD => 0x09,
            Self::Tru64 => 0x0A,
            Self::Modesto => 0x0B,
            Self::OpenBSD => 0x0C,
            Self::OpenVMS => 0x0D,
            Self::NSK => 0x0E,
            Self::AROS => 0x0F,
            Self::FenixOS => 0x10,
            Self::CloudABI => 0x11,
            Self::OpenVOS => 0x12,
            Self::Unknown(value) => *value,
        }
    }
}

impl From<u8> for ElfOsAbi {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Unspecified,
            0x01 => Self::HP_UX,
            0x02 => Self::NetBSD,
            0x03 => Self::GNU,
            0x06 => Self::Solaris,
            0x07 => Self::AIX,
            0x08 => Self::Irix,
            0x09 => Self::FreeBSD,
            0x0A => Self::Tru64,
            0x0B => Self::Modesto,
            0x0C => Self::OpenBSD,
            0x0D => Self::OpenVMS,
            0x0E => Self::NSK,
            0x0F => Self::AROS,
            0x10 => Self::FenixOS,
            0x11 => Self::CloudABI,
            0x12 => Self::OpenVOS,
            value => Self::Unknown(value),
        }
    }
}

/// This structure represents the identification bytes at the start of the ELF header, without the
/// magic bytes. These bytes indicate the class, endianness, version, OS ABI and ABI version of the
/// ELF file.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct ElfIdent {
    /// Whether the file is a 32-bit or a 64-bit object, see [ElfClass].
    pub class: ElfClass,

    /// Byte order of every multi-byte field in the file, see [ElfEndian].
    pub endian: ElfEndian,

    /// Format version byte, see [ElfVersion].
    pub version: ElfVersion,

    /// Which operating-system ABI extensions the file relies on, see [ElfOsAbi].
    pub os_abi: ElfOsAbi,

    /// Version of those OS ABI extensions.
    pub abi_version: u8,
}

impl ElfIdent {
    /// This field contains the magic bytes of an ELF file.
    pub const MAGIC_BYTES: [u8; 4] = [0x7F, 0x45, 0x4C, 0x46];

    /// Parses the first 16 bytes of an ELF file into the identification structure. Each byte is
    /// matched individually, so unrecognized values never produce undefined enum states.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::ParseFailure] - The magic bytes are missing, the data is truncated, or the class
    ///   or data-encoding byte is invalid
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 16 {
            return Err(Error::ParseFailure(format!(
                "the size {} is too low for an ELF identification",
                bytes.len()
            )));
        }
        if bytes[0..4] != Self::MAGIC_BYTES {
            return Err(Error::ParseFailure(
                "unable to find magic bytes at the start of the file".into(),
            ));
        }

        let class = ElfClass::from(bytes[4]);
        if class == ElfClass::Invalid {
            return Err(Error::ParseFailure(format!("invalid ELF class {}", bytes[4])));
        }

        let endian = ElfEndian::from(bytes[5]);
        if endian == ElfEndian::Invalid {
            return Err(Error::ParseFailure(format!(
                "invalid ELF data encoding {}",
                bytes[5]
            )));
        }

        Ok(Self {
            class,
            endian,
            version: ElfVersion::from(bytes[6]),
            os_abi: ElfOsAbi::from(bytes[7]),
            abi_version: bytes[8],
        })
    }

    /// Returns 0 for a 32-bit object and 1 for a 64-bit object. This is the normalized value used
    /// in the header feature vector.
    pub fn class_indicator(&self) -> f64 {
        match self.class {
            ElfClass::Class64 => 1.0,
            _ => 0.0,
        }
    }

    /// Returns 0 for little-endian data and 1 for big-endian data, normalized the same way as
    /// [ElfIdent::class_indicator].
    pub fn data_indicator(&self) -> f64 {
        match self.endian {
            ElfEndian::Big => 1.0,
            _ => 0.0,
        }
    }
}
