//! GPU property mailbox, used for exactly one thing here: asking the
//! firmware how much RAM the ARM owns.

use crate::cell::SyncCell;
use crate::config::{EARLY_MEMORY_END, KERNBASE, MMIO_VBASE};

const MBOX_READ: usize = MMIO_VBASE + 0xB880;
const MBOX_STATUS: usize = MMIO_VBASE + 0xB898;
const MBOX_WRITE: usize = MMIO_VBASE + 0xB8A0;

const STATUS_FULL: u32 = 1 << 31;
const STATUS_EMPTY: u32 = 1 << 30;

const CHANNEL_PROPERTY: u32 = 8;
const TAG_GET_ARM_MEMORY: u32 = 0x0001_0005;

#[repr(C, align(16))]
struct MboxBuf([u32; 9]);

static BUF: SyncCell<MboxBuf> = SyncCell::new(MboxBuf([0; 9]));

fn read(reg: usize) -> u32 {
    unsafe { (reg as *const u32).read_volatile() }
}

fn write(reg: usize, val: u32) {
    unsafe { (reg as *mut u32).write_volatile(val) }
}

fn call(channel: u32) -> bool {
    // Bus address of the buffer, through the uncached alias. The buffer
    // is 16-byte aligned, so the low bits are free for the channel.
    let pa = BUF.get() as usize - KERNBASE;
    let msg = pa as u32 | 0xC000_0000 | channel;

    while read(MBOX_STATUS) & STATUS_FULL != 0 {}
    write(MBOX_WRITE, msg);
    loop {
        while read(MBOX_STATUS) & STATUS_EMPTY != 0 {}
        if read(MBOX_READ) & 0xF == channel {
            break;
        }
    }
    let buf = unsafe { BUF.get_mut() };
    buf.0[1] == 0x8000_0000
}

/// ARM memory size in bytes. Falls back to the conservative boot window
/// if the firmware call fails.
pub fn arm_memory_size() -> usize {
    let buf = unsafe { BUF.get_mut() };
    buf.0 = [
        9 * 4,              // buffer size
        0,                  // request
        TAG_GET_ARM_MEMORY, // tag
        8,                  // value buffer size
        0,                  // request length
        0,                  // base
        0,                  // size
        0,                  // end tag
        0,
    ];
    if call(CHANNEL_PROPERTY) {
        let size = unsafe { BUF.get_mut() }.0[6] as usize;
        if size != 0 {
            return size;
        }
    }
    EARLY_MEMORY_END
}
