//! Record model for the recording container format.
//!
//! A recording is a flat sequence of timestamped, type-tagged records. The
//! closed set of reading kinds the pipeline understands is enumerated in
//! [`ReadingKind`]; anything else travels through the pipeline as an opaque
//! payload and is written back byte-identically.

/// File extension used by recording files.
pub const RECORDING_EXTENSION: &str = "rec";

/// Wire tags for the reading kinds the instrument emits.
const TAG_LEGACY_ACCELERATION: u32 = 1010;
const TAG_ACCELERATION: u32 = 1030;
const TAG_ANGULAR_VELOCITY: u32 = 1031;
const TAG_MAGNETIC_FIELD: u32 = 1032;
const TAG_ALTITUDE: u32 = 1038;
const TAG_GROUND_SPEED: u32 = 1046;
const TAG_GEODETIC_HEADING: u32 = 1037;
const TAG_SWITCH_STATE: u32 = 1060;

/// The closed set of reading kinds relevant to classification and correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadingKind {
    /// Pre-SI acceleration channel (3 axes, milli-g).
    LegacyAcceleration,
    /// SI-named acceleration channel (3 axes).
    Acceleration,
    /// Magnetic field (3 axes).
    MagneticField,
    /// Angular velocity (3 axes).
    AngularVelocity,
    /// Altitude (scalar).
    Altitude,
    /// Ground speed (scalar).
    GroundSpeed,
    /// Geodetic north heading (scalar).
    GeodeticHeading,
    /// Switch state channel; payload is opaque to the pipeline.
    SwitchState,
}

impl ReadingKind {
    /// Map a wire tag to a known reading kind.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            TAG_LEGACY_ACCELERATION => Some(Self::LegacyAcceleration),
            TAG_ACCELERATION => Some(Self::Acceleration),
            TAG_ANGULAR_VELOCITY => Some(Self::AngularVelocity),
            TAG_MAGNETIC_FIELD => Some(Self::MagneticField),
            TAG_ALTITUDE => Some(Self::Altitude),
            TAG_GROUND_SPEED => Some(Self::GroundSpeed),
            TAG_GEODETIC_HEADING => Some(Self::GeodeticHeading),
            TAG_SWITCH_STATE => Some(Self::SwitchState),
            _ => None,
        }
    }

    /// The wire tag for this kind.
    pub fn tag(self) -> u32 {
        match self {
            Self::LegacyAcceleration => TAG_LEGACY_ACCELERATION,
            Self::Acceleration => TAG_ACCELERATION,
            Self::AngularVelocity => TAG_ANGULAR_VELOCITY,
            Self::MagneticField => TAG_MAGNETIC_FIELD,
            Self::Altitude => TAG_ALTITUDE,
            Self::GroundSpeed => TAG_GROUND_SPEED,
            Self::GeodeticHeading => TAG_GEODETIC_HEADING,
            Self::SwitchState => TAG_SWITCH_STATE,
        }
    }

    /// Whether this kind carries a three-axis payload.
    pub fn is_triplet(self) -> bool {
        matches!(
            self,
            Self::LegacyAcceleration
                | Self::Acceleration
                | Self::AngularVelocity
                | Self::MagneticField
        )
    }

    /// Whether this kind carries a single scalar payload.
    pub fn is_scalar(self) -> bool {
        matches!(self, Self::Altitude | Self::GroundSpeed | Self::GeodeticHeading)
    }
}

/// Decoded record payload.
///
/// `Opaque` covers switch-state records, unknown tags, and any payload that
/// fails to decode for its declared kind. Opaque bytes are preserved exactly
/// so that passthrough records re-encode byte-identically.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Three-axis sample, instrument-native single precision.
    Triplet { x: f32, y: f32, z: f32 },
    /// Single scalar sample.
    Scalar(f32),
    /// Undecoded raw payload bytes.
    Opaque(Vec<u8>),
}

/// One entry in a recording: wire tag, sample timestamp, payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Wire tag as read from the container.
    pub tag: u32,
    /// Sample timestamp in microseconds; monotonic in theory only.
    pub sample_time_us: i64,
    /// Decoded payload.
    pub payload: Payload,
}

impl Record {
    /// Construct a three-axis record for a triplet kind.
    pub fn triplet(kind: ReadingKind, sample_time_us: i64, x: f32, y: f32, z: f32) -> Self {
        debug_assert!(kind.is_triplet());
        Self {
            tag: kind.tag(),
            sample_time_us,
            payload: Payload::Triplet { x, y, z },
        }
    }

    /// Construct a scalar record for a scalar kind.
    pub fn scalar(kind: ReadingKind, sample_time_us: i64, value: f32) -> Self {
        debug_assert!(kind.is_scalar());
        Self {
            tag: kind.tag(),
            sample_time_us,
            payload: Payload::Scalar(value),
        }
    }

    /// Construct a record with raw undecoded payload bytes.
    pub fn opaque(tag: u32, sample_time_us: i64, bytes: Vec<u8>) -> Self {
        Self {
            tag,
            sample_time_us,
            payload: Payload::Opaque(bytes),
        }
    }

    /// The known reading kind for this record, if any.
    pub fn kind(&self) -> Option<ReadingKind> {
        ReadingKind::from_tag(self.tag)
    }
}
