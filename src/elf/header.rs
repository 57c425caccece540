use bitflags::bitflags;

use crate::elf::ident::{ElfClass, ElfIdent};
use crate::{Error, Result};

macro_rules! read_class_dependent {
    ($ident_field: expr, $slice_field: ident, $offset: expr) => {
        match $ident_field.class {
            ElfClass::Invalid => {
                return Err(Error::ParseFailure("invalid ELF class".into()))
            }
            ElfClass::Class32 => $ident_field.endian.read::<u32>($slice_field, Some($offset))? as u64,
            ElfClass::Class64 => $ident_field.endian.read::<u64>($slice_field, Some($offset))?,
        }
    };
}

/// This enum represents the `e_type` field: what kind of object the file is (relocatable,
/// executable, shared object or core dump). Unregistered values are kept in
/// [FileType::Unknown] so the raw number survives into the header feature vector.
///
/// ## See also
/// - [ELF Header](https://www.sco.com/developers/gabi/latest/ch4.eheader.html) by SCO, Inc.
#[repr(u16)]
#[rustfmt::skip]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
pub enum FileType {
    #[default]
    None         = 0,
    Relocatable  = 1,
    Executable   = 2,
    SharedObject = 3,
    Core         = 4,
    Unknown(u16) = 5,
}

impl FileType {
    /// Returns the raw `e_type` value this variant was parsed from.
    pub fn value(&self) -> u16 {
        match self {
            Self::None => 0,
            Self::Relocatable => 1,
            Self::Executable => 2,
            Self::SharedObject => 3,
            Self::Core => 4,
            Self::Unknown(value) => *value,
        }
    }
}

impl From<u16> for FileType {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Relocatable,
            2 => Self::Executable,
            3 => Self::SharedObject,
            4 => Self::Core,
            value => Self::Unknown(value),
        }
    }
}

/// This enum represents the target architecture/machine of the ELF file. Architectures outside
/// the named set are preserved in [TargetMachine::Other] so the raw `e_machine` value survives
/// into the header feature vector.
///
/// ## See also
/// - [ELF Header](https://www.sco.com/developers/gabi/latest/ch4.eheader.html) by SCO, Inc.
#[repr(u16)]
#[rustfmt::skip]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
pub enum TargetMachine {
    #[default]
    None        = 0,
    X86         = 3,
    MIPS        = 8,
    PowerPC     = 20,
    ARM         = 40,
    X86_64      = 62,
    ARM64       = 183,
    RISCV       = 243,
    Other(u16)  = 244,
}

impl TargetMachine {
    /// Returns the raw `e_machine` value this variant was parsed from.
    pub fn value(&self) -> u16 {
        match self {
            Self::None => 0,
            Self::X86 => 3,
            Self::MIPS => 8,
            Self::PowerPC => 20,
            Self::ARM => 40,
            Self::X86_64 => 62,
            Self::ARM64 => 183,
            Self::RISCV => 243,
            Self::Other(value) => *value,
        }
    }
}

impl From<u16> for TargetMachine {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::None,
            3 => Self::X86,
            8 => Self::MIPS,
            20 => Self::PowerPC,
            40 => Self::ARM,
            62 => Self::X86_64,
            183 => Self::ARM64,
            243 => Self::RISCV,
            value => Self::Other(value),
        }
    }
}

/// The ELF file header: identification bytes followed by the fields that locate and size the two
/// header tables. Every numeric field keeps its declared width here so it can be projected
/// losslessly into the header feature vector.
///
/// ## See also
/// - [ELF Header](https://www.sco.com/developers/gabi/latest/ch4.eheader.html) by SCO, Inc.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct FileHeader {
    /// Identification bytes (everything after the magic), see [ElfIdent].
    pub ident: ElfIdent,

    /// Kind of object file, see [FileType].
    pub ty: FileType,

    /// Architecture the file targets, see [TargetMachine].
    pub machine: TargetMachine,

    /// Object-file format version (`e_version`).
    pub version: u32,

    /// Virtual address execution starts at; none when the file declares no entrypoint.
    pub entry_address: Option<u64>,

    /// Where the program header table starts in the file, zero when the table is absent.
    pub program_header_offset: u64,

    /// Where the section header table starts in the file, zero when the table is absent.
    pub section_header_offset: u64,

    /// Architecture-specific flag bits (`e_flags`).
    pub flags: u32,

    /// Byte length of this header itself.
    pub file_header_size: u16,

    /// Byte length of one program header table row; every row shares it.
    pub program_header_size: u16,

    /// Number of rows in the program header table, zero when the table is absent.
    pub program_header_count: u16,

    /// Byte length of one section header table row; every row shares it.
    pub section_header_size: u16,

    /// Number of rows in the section header table, zero when the table is absent.
    pub section_header_count: u16,

    /// Table index of the section-name string table, `SHN_UNDEF` when the file carries none.
    pub string_table_index: u16,
}

impl FileHeader {
    /// This function parses the specified slice into an ELF file header. The slice must start at
    /// the first byte of the file; the identification bytes are validated before any
    /// class-dependent field is read.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::ParseFailure] - The identification bytes are invalid or the file is truncated
    pub fn read(slice: &[u8]) -> Result<FileHeader> {
        let ident = ElfIdent::parse(slice)?;

        // The remaining ident bytes are padding, the fixed-width fields start at offset 16.
        let mut offset = 16;
        let ty = ident.endian.read::<u16>(slice, Some(&mut offset))?;
        let machine = ident.endian.read::<u16>(slice, Some(&mut offset))?;
        let version = ident.endian.read::<u32>(slice, Some(&mut offset))?;

        // Read entrypoint address and the offsets of both header tables
        let entry_address = read_class_dependent!(ident, slice, &mut offset);
        let program_header_offset = read_class_dependent!(ident, slice, &mut offset);
        let section_header_offset = read_class_dependent!(ident, slice, &mut offset);

        // Read target flags and the size of this header
        let flags = ident.endian.read::<u32>(slice, Some(&mut offset))?;
        let file_header_size = ident.endian.read::<u16>(slice, Some(&mut offset))?;

        // Row size and row count of the program header table
        let program_header_size = ident.endian.read::<u16>(slice, Some(&mut offset))?;
        let program_header_count = ident.endian.read::<u16>(slice, Some(&mut offset))?;

        // Row size and row count of the section header table
        let section_header_size = ident.endian.read::<u16>(slice, Some(&mut offset))?;
        let section_header_count = ident.endian.read::<u16>(slice, Some(&mut offset))?;

        // Read index of the section-name string table
        let string_table_index = ident.endian.read::<u16>(slice, Some(&mut offset))?;

        Ok(Self {
            ident,
            ty: FileType::from(ty),
            machine: TargetMachine::from(machine),
            version,
            entry_address: if entry_address == 0 { None } else { Some(entry_address) },
            program_header_offset,
            section_header_offset,
            flags,
            file_header_size,
            program_header_size,
            program_header_count,
            section_header_size,
            section_header_count,
            string_table_index,
        })
    }
}

/// This enum represents the `p_type` field of a program header: what role the segment plays at
/// run time. Unregistered values land in [SegmentType::Unknown].
///
/// ## See also
/// - [Program Header](https://www.sco.com/developers/gabi/latest/ch5.pheader.html) by SCO, Inc.
#[repr(u32)]
#[rustfmt::skip]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
pub enum SegmentType {
    /// This type is unused. Other member values are undefined for it.
    #[default]
    Null         = 0x0,

    /// A loadable segment, mapped into memory at its virtual address.
    Load         = 0x1,

    /// A segment that contains dynamic linking information.
    Dynamic      = 0x2,

    /// The location and size of a null-terminated interpreter path name.
    Interp       = 0x3,

    /// The location and size of auxiliary information.
    Note         = 0x4,

    /// Reserved with unspecified semantics.
    ShLib        = 0x5,

    /// The location and size of the program header table itself.
    Phdr         = 0x6,

    /// The thread-local storage template.
    Tls          = 0x7,

    GnuEhFrame   = 0x6474E550,
    GnuStack     = 0x6474E551,
    GnuRelro     = 0x6474E552,
    GnuProperty  = 0x6474E553,
    Unknown(u32) = 0xFFFFFFFF,
}

impl From<u32> for SegmentType {
    fn from(value: u32) -> Self {
        match value {
            0x00000000 => Self::Null,
            0x00000001 => Self::Load,
            0x00000002 => Self::Dynamic,
            0x00000003 => Self::Interp,
            0x00000004 => Self::Note,
            0x00000005 => Self::ShLib,
            0x00000006 => Self::Phdr,
            0x00000007 => Self::Tls,
            0x6474E550 => Self::GnuEhFrame,
            0x6474E551 => Self::GnuStack,
            0x6474E552 => Self::GnuRelro,
            0x6474E553 => Self::GnuProperty,
            value => Self::Unknown(value),
        }
    }
}

bitflags! {
    /// Permission bits of a segment, consulted by the loader when it maps the segment into
    /// memory.
    #[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
    pub struct SegmentFlags: u32 {
        /// Instructions in this segment may be executed
        const EXECUTABLE = 0x1;

        /// This segment may be modified at run time
        const WRITABLE   = 0x2;

        /// This segment may be read
        const READABLE   = 0x4;
    }
}

impl SegmentFlags {
    /// Renders the flags the way `readelf` prints them, e.g. `R E` for a readable executable
    /// segment. Both program-header sources feed this textual form into the feature builder.
    pub fn render(&self) -> String {
        let mut text = String::with_capacity(3);
        text.push(if self.contains(Self::READABLE) { 'R' } else { ' ' });
        text.push(if self.contains(Self::WRITABLE) { 'W' } else { ' ' });
        text.push(if self.contains(Self::EXECUTABLE) { 'E' } else { ' ' });
        text
    }
}

/// One row of the program header table, describing a runtime segment: what kind it is, where its
/// bytes live in the file, where they land in memory, how large both images are and how the
/// segment must be aligned.
///
/// ## See also
/// - [Program Header](https://www.sco.com/developers/gabi/latest/ch5.pheader.html) by SCO, Inc.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
pub struct ProgramHeader {
    /// Kind of segment this row describes, see [SegmentType].
    pub ty: SegmentType,

    /// Permission bits of the segment.
    pub flags: SegmentFlags,

    /// Position of the segment's first byte within the file.
    pub offset: u64,

    /// Virtual address the segment is mapped at.
    pub virtual_address: u64,

    /// Physical load address, meaningful only on targets where physical addressing matters.
    pub physical_address: u64,

    /// Number of bytes the segment occupies in the file image.
    pub file_size: u64,

    /// Number of bytes the segment occupies once mapped; anything past the file image is
    /// zero-filled.
    pub memory_size: u64,

    /// Required alignment of the segment in memory.
    pub alignment: u64,
}

impl ProgramHeader {
    /// This function reads a single program header at the specified offset. The flags field sits
    /// at a different position in 32-bit and 64-bit objects, so the class decides the read order.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::ParseFailure] - The table is truncated or the class is invalid
    ///
    /// ## See also
    /// - [Program Header](https://www.sco.com/developers/gabi/latest/ch5.pheader.html) by SCO, Inc.
    pub fn read(ident: &ElfIdent, slice: &[u8], mut offset: usize) -> Result<Self> {
        let endian = &ident.endian;
        let mut program_header = Self::default();
        program_header.ty = SegmentType::from(endian.read::<u32>(slice, Some(&mut offset))?);

        // Read segment flags if 64-bit ELF
        if ident.class == ElfClass::Class64 {
            program_header.flags =
                SegmentFlags::from_bits_retain(endian.read(slice, Some(&mut offset))?);
        }

        // Read values in the center of the header
        program_header.offset = read_class_dependent!(ident, slice, &mut offset);
        program_header.virtual_address = read_class_dependent!(ident, slice, &mut offset);
        program_header.physical_address = read_class_dependent!(ident, slice, &mut offset);
        program_header.file_size = read_class_dependent!(ident, slice, &mut offset);
        program_header.memory_size = read_class_dependent!(ident, slice, &mut offset);

        // Read segment flags if 32-bit ELF
        if ident.class == ElfClass::Class32 {
            program_header.flags =
                SegmentFlags::from_bits_retain(endian.read(slice, Some(&mut offset))?);
        }

        // Alignment closes the row
        program_header.alignment = read_class_dependent!(ident, slice, &mut offset);
        Ok(program_header)
    }
}

/// This enum represents every common type of an ELF section. This enum is used by the library to
/// make the API more user-friendly.
#[repr(u32)]
#[rustfmt::skip]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
pub enum SectionType {
    #[default]
    Null             = 0,
    ProgBits         = 1,
    SymbolTable      = 2,
    StringTable      = 3,
    Rela             = 4,
    Hash             = 5,
    Dynamic          = 6,
    Note             = 7,
    NoBits           = 8,
    Rel              = 9,
    ShLib            = 10,
    DynamicSymbol    = 11,
    InitArray        = 14,
    FiniArray        = 15,
    PreInitArray     = 16,
    Group            = 17,
    SymbolTableIndex = 18,
    Unknown(u32)     = 19,
}

impl From<u32> for SectionType {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Null,
            1 => Self::ProgBits,
            2 => Self::SymbolTable,
            3 => Self::StringTable,
            4 => Self::Rela,
            5 => Self::Hash,
            6 => Self::Dynamic,
            7 => Self::Note,
            8 => Self::NoBits,
            9 => Self::Rel,
            10 => Self::ShLib,
            11 => Self::DynamicSymbol,
            14 => Self::InitArray,
            15 => Self::FiniArray,
            16 => Self::PreInitArray,
            17 => Self::Group,
            18 => Self::SymbolTableIndex,
            value => Self::Unknown(value),
        }
    }
}

bitflags! {
    /// Attribute bits of a section header. The bit assignments are fixed by the ELF ABI.
    #[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
    pub struct SectionFlags: u64 {
        /// The section may be modified while the process runs
        const WRITE            = 0x1;

        /// The section takes up memory once the program is loaded
        const ALLOC            = 0x2;

        /// Machine code lives in this section
        const INSTRUCTIONS     = 0x4;

        /// Identical entries in this section may be folded together at link time
        const MERGE            = 0x10;

        /// The section body is a sequence of zero-terminated strings
        const STRINGS          = 0x20;

        /// `info` names another section by table index
        const INFO_LINK        = 0x40;

        /// Link editors must keep this section ordered relative to its linked section
        const LINK_ORDER       = 0x80;

        /// Handling this section correctly needs OS-specific treatment
        const OS_NONCONFORMING = 0x100;

        /// Part of a section group
        const GROUP            = 0x200;

        /// Backing storage for thread-local variables
        const TLS              = 0x400;

        /// The section body is stored compressed
        const COMPRESSED       = 0x800;
    }
}

/// This structure represents the header of an ELF section.
///
/// ## See also
/// - [Sections](https://www.sco.com/developers/gabi/latest/ch4.sheader.html) by SCO, Inc.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
pub struct SectionHeader {
    /// Offset of this section's name inside the section-name string table.
    pub name: u32,

    /// What the section contains, see [SectionType].
    pub ty: SectionType,

    /// Attribute bits of the section.
    pub flags: SectionFlags,

    /// Address of the section's first byte for sections that are mapped into memory, zero
    /// otherwise.
    pub addr: u64,

    /// Position of the section's first byte within the file.
    pub offset: u64,

    /// Byte length of the section.
    pub size: u64,

    /// Index of a related section; which one depends on the section type.
    pub link: u32,

    /// Type-dependent auxiliary value.
    pub info: u32,

    /// Required alignment of the section.
    pub addr_align: u64,

    /// Width of the fixed-size records in table-like sections such as the symbol table, zero
    /// when the section holds no such records.
    pub entry_size: u64,
}

impl SectionHeader {
    /// This function reads a single section header at the specified offset.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::ParseFailure] - The table is truncated or the class is invalid
    ///
    /// ## See also
    /// - [Sections](https://www.sco.com/developers/gabi/latest/ch4.sheader.html) by SCO, Inc.
    pub fn read(ident: &ElfIdent, slice: &[u8], mut offset: usize) -> Result<Self> {
        let endian = &ident.endian;
        let mut section_header = Self::default();
        section_header.name = endian.read::<u32>(slice, Some(&mut offset))?;
        section_header.ty = SectionType::from(endian.read::<u32>(slice, Some(&mut offset))?);
        section_header.flags =
            SectionFlags::from_bits_retain(read_class_dependent!(ident, slice, &mut offset));
        section_header.addr = read_class_dependent!(ident, slice, &mut offset);
        section_header.offset = read_class_dependent!(ident, slice, &mut offset);
        section_header.size = read_class_dependent!(ident, slice, &mut offset);
        section_header.link = endian.read::<u32>(slice, Some(&mut offset))?;
        section_header.info = endian.read::<u32>(slice, Some(&mut offset))?;
        section_header.addr_align = read_class_dependent!(ident, slice, &mut offset);
        section_header.entry_size = read_class_dependent!(ident, slice, &mut offset);
        Ok(section_header)
    }
}
