use crate::boxes::FourCC;

/// Typed view over the QuickTime atoms this crate knows by name.
///
/// Anything not in this list becomes `KnownBox::Unknown(fourcc)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownBox {
    // File-level / top-level
    Ftyp,
    Moov,
    Mdat,
    Free,
    Skip,
    Wide,
    Pnot,

    // moov children
    Mvhd,
    Trak,
    Udta,
    Meta,

    // trak children
    Tkhd,
    Tapt,
    Edts,
    Tref,
    Mdia,

    // tapt children
    Clef,
    Prof,
    Enof,

    // edts children
    Elst,

    // mdia children
    Mdhd,
    Hdlr,
    Minf,

    // minf children
    Vmhd,
    Smhd,
    Gmhd,
    Gmin,
    Dinf,
    Stbl,

    // dinf children
    Dref,

    // stbl children
    Stsd,
    Stts,
    Stss,
    Sdtp,
    Stsc,
    Stsz,
    Stco,
    Co64,

    // Anything else
    Unknown(FourCC),
}

static DEFAULT_CONTAINERS: [KnownBox; 11] = [
    KnownBox::Moov,
    KnownBox::Trak,
    KnownBox::Tapt,
    KnownBox::Meta,
    KnownBox::Edts,
    KnownBox::Tref,
    KnownBox::Mdia,
    KnownBox::Minf,
    KnownBox::Dinf,
    KnownBox::Stbl,
    KnownBox::Gmhd,
];

impl From<FourCC> for KnownBox {
    fn from(cc: FourCC) -> Self {
        match &cc.0 {
            b"ftyp" => KnownBox::Ftyp,
            b"moov" => KnownBox::Moov,
            b"mdat" => KnownBox::Mdat,
            b"free" => KnownBox::Free,
            b"skip" => KnownBox::Skip,
            b"wide" => KnownBox::Wide,
            b"pnot" => KnownBox::Pnot,

            b"mvhd" => KnownBox::Mvhd,
            b"trak" => KnownBox::Trak,
            b"udta" => KnownBox::Udta,
            b"meta" => KnownBox::Meta,

            b"tkhd" => KnownBox::Tkhd,
            b"tapt" => KnownBox::Tapt,
            b"edts" => KnownBox::Edts,
            b"tref" => KnownBox::Tref,
            b"mdia" => KnownBox::Mdia,

            b"clef" => KnownBox::Clef,
            b"prof" => KnownBox::Prof,
            b"enof" => KnownBox::Enof,

            b"elst" => KnownBox::Elst,

            b"mdhd" => KnownBox::Mdhd,
            b"hdlr" => KnownBox::Hdlr,
            b"minf" => KnownBox::Minf,

            b"vmhd" => KnownBox::Vmhd,
            b"smhd" => KnownBox::Smhd,
            b"gmhd" => KnownBox::Gmhd,
            b"gmin" => KnownBox::Gmin,
            b"dinf" => KnownBox::Dinf,
            b"stbl" => KnownBox::Stbl,

            b"dref" => KnownBox::Dref,

            b"stsd" => KnownBox::Stsd,
            b"stts" => KnownBox::Stts,
            b"stss" => KnownBox::Stss,
            b"sdtp" => KnownBox::Sdtp,
            b"stsc" => KnownBox::Stsc,
            b"stsz" => KnownBox::Stsz,
            b"stco" => KnownBox::Stco,
            b"co64" => KnownBox::Co64,

            _ => KnownBox::Unknown(cc),
        }
    }
}

impl KnownBox {
    pub fn fourcc(&self) -> FourCC {
        let code: &[u8; 4] = match self {
            KnownBox::Ftyp => b"ftyp",
            KnownBox::Moov => b"moov",
            KnownBox::Mdat => b"mdat",
            KnownBox::Free => b"free",
            KnownBox::Skip => b"skip",
            KnownBox::Wide => b"wide",
            KnownBox::Pnot => b"pnot",
            KnownBox::Mvhd => b"mvhd",
            KnownBox::Trak => b"trak",
            KnownBox::Udta => b"udta",
            KnownBox::Meta => b"meta",
            KnownBox::Tkhd => b"tkhd",
            KnownBox::Tapt => b"tapt",
            KnownBox::Edts => b"edts",
            KnownBox::Tref => b"tref",
            KnownBox::Mdia => b"mdia",
            KnownBox::Clef => b"clef",
            KnownBox::Prof => b"prof",
            KnownBox::Enof => b"enof",
            KnownBox::Elst => b"elst",
            KnownBox::Mdhd => b"mdhd",
            KnownBox::Hdlr => b"hdlr",
            KnownBox::Minf => b"minf",
            KnownBox::Vmhd => b"vmhd",
            KnownBox::Smhd => b"smhd",
            KnownBox::Gmhd => b"gmhd",
            KnownBox::Gmin => b"gmin",
            KnownBox::Dinf => b"dinf",
            KnownBox::Stbl => b"stbl",
            KnownBox::Dref => b"dref",
            KnownBox::Stsd => b"stsd",
            KnownBox::Stts => b"stts",
            KnownBox::Stss => b"stss",
            KnownBox::Sdtp => b"sdtp",
            KnownBox::Stsc => b"stsc",
            KnownBox::Stsz => b"stsz",
            KnownBox::Stco => b"stco",
            KnownBox::Co64 => b"co64",
            KnownBox::Unknown(cc) => return *cc,
        };
        FourCC(*code)
    }

    /// Human-readable name, or `"Unknown Atom"`.
    pub fn full_name(&self) -> &'static str {
        match self {
            KnownBox::Ftyp => "File Type Atom",
            KnownBox::Moov => "Movie Atom",
            KnownBox::Mdat => "Movie Data Atom",
            KnownBox::Free => "Free Space Atom",
            KnownBox::Skip => "Skip Atom",
            KnownBox::Wide => "Wide Atom",
            KnownBox::Pnot => "Preview Atom",
            KnownBox::Mvhd => "Movie Header Atom",
            KnownBox::Trak => "Track Atom",
            KnownBox::Udta => "User Data Atom",
            KnownBox::Meta => "Metadata Atom",
            KnownBox::Tkhd => "Track Header Atom",
            KnownBox::Tapt => "Track Aperture Mode Dimensions Atom",
            KnownBox::Edts => "Edit Atom",
            KnownBox::Tref => "Track Reference Atom",
            KnownBox::Mdia => "Media Atom",
            KnownBox::Clef => "Track Clean Aperture Dimensions Atom",
            KnownBox::Prof => "Track Production Aperture Dimensions Atom",
            KnownBox::Enof => "Track Encoded Pixels Dimensions Atom",
            KnownBox::Elst => "Edit List Atom",
            KnownBox::Mdhd => "Media Header Atom",
            KnownBox::Hdlr => "Handler Reference Atom",
            KnownBox::Minf => "Media Information Atom",
            KnownBox::Vmhd => "Video Media Information Header Atom",
            KnownBox::Smhd => "Sound Media Information Header Atom",
            KnownBox::Gmhd => "Base Media Information Header Atom",
            KnownBox::Gmin => "Base Media Info Atom",
            KnownBox::Dinf => "Data Information Atom",
            KnownBox::Stbl => "Sample Table Atom",
            KnownBox::Dref => "Data Reference Atom",
            KnownBox::Stsd => "Sample Description Atom",
            KnownBox::Stts => "Time-to-Sample Atom",
            KnownBox::Stss => "Sync Sample Atom",
            KnownBox::Sdtp => "Sample Dependency Flags Atom",
            KnownBox::Stsc => "Sample-to-Chunk Atom",
            KnownBox::Stsz => "Sample Size Atom",
            KnownBox::Stco => "Chunk Offset Atom",
            KnownBox::Co64 => "64-bit Chunk Offset Atom",
            KnownBox::Unknown(_) => "Unknown Atom",
        }
    }

    /// Whether the default parser descends into this atom.
    pub fn is_container(&self) -> bool {
        DEFAULT_CONTAINERS.contains(self)
    }

    pub fn default_containers() -> impl Iterator<Item = FourCC> {
        DEFAULT_CONTAINERS.iter().map(KnownBox::fourcc)
    }
}
