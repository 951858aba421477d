/// clear — wipe the terminal and re-print the banner.
pub fn run() {
    print!("\x1B[2J\x1B[H");
    crate::shell::banner();
}
