cfgenius::cond! {
    if cfg(windows) {
        mod windows;
        pub use self::windows::*;
    } else if cfg(unix) {
        mod unix;
        pub use self::unix::*;
    } else {
        compile_error!("swapmap only supports Unix and Windows targets");
    }
}
