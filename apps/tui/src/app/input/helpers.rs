/// Step back through `len` items, wrapping from the first to the last.
pub const fn wrap_decrement(index: usize, len: usize) -> usize {
    match (index, len) {
        (_, 0) => 0,
        (0, len) => len - 1,
        (index, len) if index > len => len - 1,
        (index, _) => index - 1,
    }
}

/// Step forward through `len` items, wrapping from the last to the first.
pub const fn wrap_increment(index: usize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (index + 1) % len
}
