//! The _service_descriptor_ gives the name and type of a service listed in the SDT.

use super::DescriptorError;
use std::fmt;

/// Provides the service name, the name of its provider, and the type of service.
///
/// Names are returned as raw bytes; the first byte may select a character table, as described in
/// _ETSI EN 300 468, Annex A_.
pub struct ServiceDescriptor<'buf> {
    buf: &'buf [u8],
}
impl<'buf> ServiceDescriptor<'buf> {
    /// The descriptor tag value which identifies the descriptor as a `ServiceDescriptor`.
    pub const TAG: u8 = super::tag::SERVICE;

    /// Construct a `ServiceDescriptor` instance that will parse the data from the given slice,
    /// checking that both name fields fit within it.
    pub fn new(_tag: u8, buf: &'buf [u8]) -> Result<ServiceDescriptor<'buf>, DescriptorError> {
        let too_short = |expected| DescriptorError::NotEnoughData {
            tag: Self::TAG,
            actual: buf.len(),
            expected,
        };
        if buf.len() < 3 {
            return Err(too_short(3));
        }
        let provider_end = 2 + buf[1] as usize;
        if provider_end >= buf.len() {
            return Err(too_short(provider_end + 1));
        }
        let service_end = provider_end + 1 + buf[provider_end] as usize;
        if service_end > buf.len() {
            return Err(too_short(service_end));
        }
        Ok(ServiceDescriptor { buf })
    }

    /// `0x01` for digital television, `0x02` for digital radio, `0x19` for HD television, and so
    /// on.
    pub fn service_type(&self) -> u8 {
        self.buf[0]
    }

    fn provider_end(&self) -> usize {
        2 + self.buf[1] as usize
    }

    pub fn provider_name(&self) -> &'buf [u8] {
        &self.buf[2..self.provider_end()]
    }

    pub fn service_name(&self) -> &'buf [u8] {
        let start = self.provider_end() + 1;
        let len = self.buf[self.provider_end()] as usize;
        &self.buf[start..start + len]
    }
}
impl<'buf> fmt::Debug for ServiceDescriptor<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("ServiceDescriptor")
            .field("service_type", &self.service_type())
            .field(
                "provider_name",
                &String::from_utf8_lossy(self.provider_name()),
            )
            .field("service_name", &String::from_utf8_lossy(self.service_name()))
            .finish()
    }
}
