//! Debug reports
//!
//! Console output goes through `Hal::debug_write` one line at a time, so
//! nothing here needs an allocator.

use core::fmt::Write;

use cinder_hal::Hal;
use cinder_kernel_core::invariants::{check_all_invariants, Violations};
use cinder_kernel_core::{ContextBuilder, KernelError, KernelSnapshot};

use crate::Kernel;

/// Bytes per hexdump row
const ROW: usize = 0x10;

type Line = heapless::String<128>;

fn hex_row(line: &mut Line, addr: usize, bytes: &[u8], canonical: bool) -> core::fmt::Result {
    write!(line, "{:08x} ", addr)?;
    for (m, byte) in bytes.iter().enumerate() {
        if m % 8 == 0 {
            line.push(' ').map_err(|_| core::fmt::Error)?;
        }
        write!(line, "{:02x} ", byte)?;
    }
    for m in 0..ROW - bytes.len() {
        if m != 0 && m % 8 == 0 {
            line.push(' ').map_err(|_| core::fmt::Error)?;
        }
        line.push_str("   ").map_err(|_| core::fmt::Error)?;
    }
    if canonical {
        line.push_str(" |").map_err(|_| core::fmt::Error)?;
        for &byte in bytes {
            let c = if (b' '..=b'~').contains(&byte) {
                byte as char
            } else {
                '.'
            };
            line.push(c).map_err(|_| core::fmt::Error)?;
        }
        line.push('|').map_err(|_| core::fmt::Error)?;
    }
    line.push('\n').map_err(|_| core::fmt::Error)
}

impl<H: Hal, C: ContextBuilder> Kernel<H, C> {
    /// Write the free list to the console.
    pub fn memory_report(&mut self) {
        self.critical(|k| {
            let mut line = Line::new();
            let _ = writeln!(
                line,
                "{:10} bytes of free memory.  Free list:",
                k.state.memory.free_total()
            );
            k.hal.debug_write(&line);

            for block in k.state.memory.blocks() {
                line.clear();
                let _ = writeln!(
                    line,
                    "           [0x{:08X} to 0x{:08X}]",
                    block.addr,
                    block.addr + block.length - 1
                );
                k.hal.debug_write(&line);
            }
        })
    }

    /// Dump `len` bytes of heap memory from `addr` in 16-byte rows, with an
    /// ASCII gutter when `canonical` is set.
    ///
    /// Fails with `OutOfHeap` before printing anything if the range leaves
    /// the heap.
    pub fn hexdump(&mut self, addr: usize, len: usize, canonical: bool) -> Result<(), KernelError> {
        self.critical(|k| {
            let region = k.state.memory.region();
            if !region.contains(addr, len) {
                return Err(KernelError::OutOfHeap);
            }

            let mut row = [0u8; ROW];
            let mut line = Line::new();
            for offset in (0..len).step_by(ROW) {
                let count = (len - offset).min(ROW);
                for (i, slot) in row.iter_mut().take(count).enumerate() {
                    *slot = region
                        .read_byte(addr + offset + i)
                        .ok_or(KernelError::OutOfHeap)?;
                }
                line.clear();
                if hex_row(&mut line, addr + offset, &row[..count], canonical).is_err() {
                    return Err(KernelError::InvalidArgument);
                }
                k.hal.debug_write(&line);
            }
            Ok(())
        })
    }

    /// Copy the kernel tables into a serializable snapshot.
    pub fn snapshot(&mut self) -> KernelSnapshot {
        self.critical(|k| KernelSnapshot::capture(&k.state))
    }

    /// Check every kernel invariant. Empty when all hold.
    pub fn check_invariants(&mut self) -> Violations {
        self.critical(|k| {
            let violations = check_all_invariants(&k.state);
            for v in &violations {
                log::warn!("[Cinder Debug] invariant {}: {}", v.invariant, v.description);
            }
            violations
        })
    }

    /// Report a fatal error on the console and halt with interrupts masked.
    pub fn panic(&self, msg: &str) -> ! {
        let _mask = self.hal.disable_interrupts();
        self.hal.debug_write("\n\n\rpanic: ");
        self.hal.debug_write(msg);
        self.hal.debug_write("\n\n");
        self.hal.halt()
    }
}
