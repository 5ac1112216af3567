#[cfg(target_os = "none")]
use crate::{arch, println};

#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    if let Some(location) = info.location() {
        println!(
            "\u{1B}[31mpanicked at {}:{}: {}\u{1B}[0m",
            location.file(),
            location.line(),
            info.message()
        );
    } else {
        println!("\u{1B}[31mpanicked: {}\u{1B}[0m", info.message());
    }
    arch::halt()
}
