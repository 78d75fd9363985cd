//! Descriptors provide metadata about an element of a table.
//!
//! For example, an entry in the Service Description Table uses a _service_descriptor_ to give the
//! name of the service.  The syntax of the tables handled by this crate allows descriptors to be
//! attached to the table itself (PMT _program_info_), or to entries within the table (PMT streams,
//! SDT services, EIT events).
//!
//! The table rewriters mostly copy descriptors without looking inside them, so the
//! [`RawDescriptor`](struct.RawDescriptor.html) type gives access to the undecoded bytes.
//! [`DvbDescriptors`](enum.DvbDescriptors.html) decodes the descriptor types of interest.
//!
//! ```
//! # use dvb_si_rewrite::descriptor::{DescriptorIter, DvbDescriptors};
//! let data = [0x48, 0x06, 0x01, 0x00, 0x03, b'O', b'n', b'e'];
//! for d in DescriptorIter::<DvbDescriptors<'_>>::new(&data) {
//!     if let Ok(DvbDescriptors::Service(service)) = d {
//!         assert_eq!(service.service_name(), b"One");
//!     }
//! }
//! ```

pub mod service;

use self::service::ServiceDescriptor;
use std::fmt;
use std::marker;
use thiserror::Error;

/// Descriptor tag values from _ETSI EN 300 468_, table 12.
pub mod tag {
    pub const NETWORK_NAME: u8 = 0x40;
    pub const SERVICE_LIST: u8 = 0x41;
    pub const BOUQUET_NAME: u8 = 0x47;
    pub const SERVICE: u8 = 0x48;
    pub const LINKAGE: u8 = 0x4a;
    pub const SHORT_EVENT: u8 = 0x4d;
    pub const EXTENDED_EVENT: u8 = 0x4e;
    pub const COMPONENT: u8 = 0x50;
    pub const MOSAIC: u8 = 0x51;
    pub const CA_IDENTIFIER: u8 = 0x53;
    pub const CONTENT: u8 = 0x54;
    pub const MULTILINGUAL_SERVICE_NAME: u8 = 0x5d;
    pub const PRIVATE_DATA_SPECIFIER: u8 = 0x5f;
    pub const ANNOUNCEMENT_SUPPORT: u8 = 0x6e;
    pub const DEFAULT_AUTHORITY: u8 = 0x73;
    pub const EXTENSION: u8 = 0x7f;
}

/// Trait allowing users of this crate to supply their own descriptor types, to be decoded from
/// a descriptor loop.
pub trait Descriptor<'buf>: Sized {
    /// Create an object that can decode the descriptor held in the given slice, which includes
    /// the 2 byte tag and length header.
    fn from_bytes(buf: &'buf [u8]) -> Result<Self, DescriptorError>;
}

/// Builds an enum to act as a [`Descriptor`](descriptor/trait.Descriptor.html), with a variant
/// for each of the given tag values, decoded by the given type.
///
/// Tag values not listed produce `Err(DescriptorError::UnhandledTagValue(tag))`.
#[macro_export]
macro_rules! descriptor_enum {
    (
        $(#[$outer:meta])*
        $name:ident {
            $(
                $(#[$inner:ident $($args:tt)*])*
                $case_name:ident $($tags:pat_param)|* => $t:ident
            ),*,
        }
    ) => {
        $(#[$outer])*
        pub enum $name<'buf> {
            $(
                $(#[$inner $($args)*])*
                $case_name($t<'buf>),
            )*
        }
        impl<'buf> $crate::descriptor::Descriptor<'buf> for $name<'buf> {
            fn from_bytes(buf: &'buf[u8]) -> Result<Self, $crate::descriptor::DescriptorError> {
                if buf.len() <  2 {
                    return Err($crate::descriptor::DescriptorError::BufferTooShort{ buflen: buf.len() })
                }
                let tag = buf[0];
                let len = buf[1] as usize;
                let tag_end = len + 2;
                if tag_end > buf.len() {
                    return Err($crate::descriptor::DescriptorError::TagTooLongForBuffer{ taglen: len, buflen: buf.len() })
                }
                let payload = &buf[2..tag_end];
                match tag {
                    $( $( $tags )|* => Ok($name::$case_name($t::new(tag, payload)?)), )*
                    _ => Err($crate::descriptor::DescriptorError::UnhandledTagValue(tag)),
                }
            }
        }
    }
}

/// Catch-all type for when there is no explicit handling for the given descriptor type.
pub struct UnknownDescriptor<'buf> {
    /// the descriptor's identifying 'tag' value
    pub tag: u8,
    /// the bytes following the descriptor header
    pub payload: &'buf [u8],
}
impl<'buf> UnknownDescriptor<'buf> {
    /// Constructor, in the form required for use with the `descriptor_enum!{}` macro.
    pub fn new(tag: u8, payload: &'buf [u8]) -> Result<UnknownDescriptor<'buf>, DescriptorError> {
        Ok(UnknownDescriptor { tag, payload })
    }
}
impl<'buf> fmt::Debug for UnknownDescriptor<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("UnknownDescriptor")
            .field("tag", &self.tag)
            .field("len", &self.payload.len())
            .finish()
    }
}

descriptor_enum! {
    /// The DVB descriptors which this crate knows about.  Only the _service_descriptor_ is
    /// decoded in detail.
    #[derive(Debug)]
    DvbDescriptors {
        NetworkName 0x40 => UnknownDescriptor,
        ServiceList 0x41 => UnknownDescriptor,
        BouquetName 0x47 => UnknownDescriptor,
        Service 0x48 => ServiceDescriptor,
        Linkage 0x4a => UnknownDescriptor,
        ShortEvent 0x4d => UnknownDescriptor,
        ExtendedEvent 0x4e => UnknownDescriptor,
        Component 0x50 => UnknownDescriptor,
        Mosaic 0x51 => UnknownDescriptor,
        CaIdentifier 0x53 => UnknownDescriptor,
        Content 0x54 => UnknownDescriptor,
        MultilingualServiceName 0x5d => UnknownDescriptor,
        PrivateDataSpecifier 0x5f => UnknownDescriptor,
        AnnouncementSupport 0x6e => UnknownDescriptor,
        DefaultAuthority 0x73 => UnknownDescriptor,
        /// DVB extension descriptor; the real type is given by the first payload byte
        Extension 0x7f => UnknownDescriptor,
    }
}

/// A descriptor of any type, left undecoded so that it can be copied into a generated table.
#[derive(Clone, Copy)]
pub struct RawDescriptor<'buf> {
    buf: &'buf [u8],
}
impl<'buf> RawDescriptor<'buf> {
    pub fn tag(&self) -> u8 {
        self.buf[0]
    }
    /// The bytes following the 2 byte header
    pub fn payload(&self) -> &'buf [u8] {
        &self.buf[2..]
    }
    /// The whole descriptor, header included
    pub fn bytes(&self) -> &'buf [u8] {
        self.buf
    }
}
impl<'buf> Descriptor<'buf> for RawDescriptor<'buf> {
    fn from_bytes(buf: &'buf [u8]) -> Result<Self, DescriptorError> {
        if buf.len() < 2 {
            return Err(DescriptorError::BufferTooShort { buflen: buf.len() });
        }
        let taglen = buf[1] as usize;
        if taglen + 2 != buf.len() {
            return Err(DescriptorError::TagTooLongForBuffer {
                taglen,
                buflen: buf.len(),
            });
        }
        Ok(RawDescriptor { buf })
    }
}
impl<'buf> fmt::Debug for RawDescriptor<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("RawDescriptor")
            .field("tag", &self.tag())
            .field("len", &self.payload().len())
            .finish()
    }
}

/// Iterator over the descriptors in a descriptor loop.
///
/// A truncated descriptor at the end of the loop produces a single error, after which the
/// iteration stops.
pub struct DescriptorIter<'buf, Desc>
where
    Desc: Descriptor<'buf>,
{
    buf: &'buf [u8],
    phantom: marker::PhantomData<Desc>,
}
impl<'buf, Desc> DescriptorIter<'buf, Desc>
where
    Desc: Descriptor<'buf>,
{
    /// Create an iterator over the descriptors in the given slice
    pub fn new(buf: &'buf [u8]) -> DescriptorIter<'buf, Desc> {
        DescriptorIter {
            buf,
            phantom: marker::PhantomData,
        }
    }
}
impl<'buf, Desc> Iterator for DescriptorIter<'buf, Desc>
where
    Desc: Descriptor<'buf>,
{
    type Item = Result<Desc, DescriptorError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() {
            return None;
        }
        if self.buf.len() < 2 {
            let buflen = self.buf.len();
            self.buf = &self.buf[0..0];
            return Some(Err(DescriptorError::BufferTooShort { buflen }));
        }
        let tag = self.buf[0];
        let len = self.buf[1] as usize;
        let remaining_size = self.buf.len() - 2;
        if len > remaining_size {
            // ensure anther call to next() will yield None,
            self.buf = &self.buf[0..0];
            Some(Err(DescriptorError::NotEnoughData {
                tag,
                actual: remaining_size,
                expected: len,
            }))
        } else {
            let (desc, rest) = self.buf.split_at(len + 2);
            self.buf = rest;
            Some(Descriptor::from_bytes(desc))
        }
    }
}

/// An error during parsing of a descriptor
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum DescriptorError {
    /// The amount of data available in the buffer is not enough to hold the descriptor's
    /// declared size.
    #[error("descriptor tag {tag:#04x} needs {expected} bytes, but only {actual} remain")]
    NotEnoughData {
        /// descriptor tag value
        tag: u8,
        /// actual buffer size
        actual: usize,
        /// expected buffer size
        expected: usize,
    },
    /// The descriptor-length field specifies a length that can't fit in the buffer.
    #[error("descriptor length {taglen} doesn't match buffer of {buflen} bytes")]
    TagTooLongForBuffer {
        /// The descriptor-length
        taglen: usize,
        /// The buffer size
        buflen: usize,
    },
    /// The buffer is too short to even hold the 2 byte descriptor header
    #[error("{buflen} bytes is too short for a descriptor header")]
    BufferTooShort {
        /// the actual buffer length
        buflen: usize,
    },
    /// There is no mapping defined for the given descriptor tag value.
    #[error("unhandled descriptor tag {0:#04x}")]
    UnhandledTagValue(u8),
}
