//! Register bus trait
//!
//! The register bus is the host's only path to the hardware: 32-bit register
//! reads and writes, plus a device-memory allocator and host/device copies.
//! Implementations are cheap handles (`Clone`) onto one shared device, the
//! same way runtime allocators hand out copies of a device handle; every
//! method takes `&self`.

use crate::error::Result;

/// Handle to a register-mapped accelerator and its device memory
pub trait RegisterBus: Clone + Send + Sync {
    /// Attach to the named accelerator
    fn attach(&self, name: &str) -> Result<()>;

    /// Detach from the accelerator
    fn detach(&self);

    /// Read a 32-bit register
    fn read_reg(&self, idx: u32) -> u32;

    /// Write a 32-bit register
    fn write_reg(&self, idx: u32, value: u32);

    /// Allocate device memory
    ///
    /// Returns the device address. Returns `Err(ResourceExhausted)` if the
    /// allocation cannot be satisfied.
    fn alloc_device_buffer(&self, size_bytes: usize) -> Result<u64>;

    /// Release device memory previously returned by `alloc_device_buffer`
    fn dealloc_device_buffer(&self, addr: u64);

    /// Copy `src` to device memory at `dst`
    fn copy_host_to_device(&self, src: &[u8], dst: u64) -> Result<()>;

    /// Copy `dst.len()` bytes of device memory at `src` to `dst`
    fn copy_device_to_host(&self, src: u64, dst: &mut [u8]) -> Result<()>;
}

/// A device allocation: address plus size in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceBuffer {
    addr: u64,
    size: usize,
}

impl DeviceBuffer {
    /// Allocate `size` bytes on `bus`
    pub fn alloc<B: RegisterBus>(bus: &B, size: usize) -> Result<Self> {
        let addr = bus.alloc_device_buffer(size)?;
        Ok(Self { addr, size })
    }

    /// Device address
    #[inline]
    pub fn addr(&self) -> u64 {
        self.addr
    }

    /// Size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Copy host bytes into the buffer; `src` must fit
    pub fn upload<B: RegisterBus>(&self, bus: &B, src: &[u8]) -> Result<()> {
        if src.len() > self.size {
            return Err(crate::error::Error::Bus(format!(
                "upload of {} bytes overflows {}-byte buffer at {:#x}",
                src.len(),
                self.size,
                self.addr
            )));
        }
        bus.copy_host_to_device(src, self.addr)
    }

    /// Copy the start of the buffer back into `dst`; `dst` must fit
    pub fn download<B: RegisterBus>(&self, bus: &B, dst: &mut [u8]) -> Result<()> {
        if dst.len() > self.size {
            return Err(crate::error::Error::Bus(format!(
                "download of {} bytes overflows {}-byte buffer at {:#x}",
                dst.len(),
                self.size,
                self.addr
            )));
        }
        bus.copy_device_to_host(self.addr, dst)
    }

    /// Release the buffer
    pub fn release<B: RegisterBus>(self, bus: &B) {
        bus.dealloc_device_buffer(self.addr)
    }
}
