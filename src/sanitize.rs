/// Characters below 0x20 that survive sanitizing.
const KEPT_CONTROLS: &[char] = &['\t', '\n', '\r'];

/// True for the code points that can corrupt sheet XML: C0 controls (minus tab/LF/CR) and DEL.
pub fn is_stripped_control(c: char) -> bool {
    let u = c as u32;
    (u < 0x20 && !KEPT_CONTROLS.contains(&c)) || u == 0x7F
}

/// Drop control characters from an extracted string. Everything else, CJK included, passes through.
pub fn clean(s: &str) -> String {
    s.chars().filter(|&c| !is_stripped_control(c)).collect()
}

/// Clean every cell of a row in place.
pub fn clean_row(cells: &mut [String]) {
    for cell in cells.iter_mut() {
        if cell.chars().any(is_stripped_control) {
            *cell = clean(cell);
        }
    }
}
