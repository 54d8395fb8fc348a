//! The relay must not allocate. Counted per thread so the harness's own
//! threads do not interfere.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::ffi::{c_char, c_void};
use std::ptr;

use streamlite::{export_extension, DatabaseHandle, ExtensionEntryPoints};

struct CountingAlloc;

thread_local! {
    static EVENTS: Cell<usize> = const { Cell::new(0) };
}

fn bump() {
    let _ = EVENTS.try_with(|c| c.set(c.get() + 1));
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        bump();
        System.alloc(layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        bump();
        System.alloc_zeroed(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        bump();
        System.dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        bump();
        System.realloc(ptr, layout, new_size)
    }
}

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

fn events_during(f: impl FnOnce()) -> usize {
    let before = EVENTS.with(Cell::get);
    f();
    EVENTS.with(Cell::get) - before
}

struct Noop;

impl ExtensionEntryPoints for Noop {
    fn version() -> *const c_char {
        c"0.0.0".as_ptr()
    }

    unsafe fn init(_db: DatabaseHandle) {}
}

export_extension!(noop_version, noop_init, Noop);

#[test]
fn relayed_init_does_not_allocate() {
    let events = events_during(|| unsafe {
        noop_init(ptr::null_mut());
        noop_init(0x40 as *mut c_void);
    });
    assert_eq!(events, 0);
}

#[test]
fn relayed_version_does_not_allocate() {
    let events = events_during(|| {
        for _ in 0..16 {
            std::hint::black_box(noop_version());
        }
    });
    assert_eq!(events, 0);
}

#[test]
fn production_version_does_not_allocate() {
    let events = events_during(|| {
        for _ in 0..16 {
            std::hint::black_box(streamlite::streamlite_version());
        }
    });
    assert_eq!(events, 0);
}
