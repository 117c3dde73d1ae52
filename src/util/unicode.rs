use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

const ELLIPSIS: char = '\u{2026}';

/// Terminal cells needed to show `s` in a listing. A tab is shown as one
/// space.
pub fn cell_width(s: &str) -> usize {
    s.graphemes(true).map(grapheme_cells).sum()
}

/// Fit `s` into at most `max_cells` cells, ending in `…` when something
/// had to be cut. Tabs come back as spaces.
pub fn fit_to_cells(s: &str, max_cells: usize) -> String {
    let keep = if cell_width(s) <= max_cells {
        max_cells
    } else {
        // One cell goes to the ellipsis
        match max_cells.checked_sub(1) {
            Some(n) => n,
            None => return String::new(),
        }
    };

    let mut used = 0;
    let mut out = String::with_capacity(s.len());
    let mut cut = false;
    for g in s.graphemes(true) {
        let w = grapheme_cells(g);
        if used + w > keep {
            cut = true;
            break;
        }
        used += w;
        out.push_str(if g == "\t" { " " } else { g });
    }
    if cut {
        out.push(ELLIPSIS);
    }
    out
}

/// Right-align `s` in a column `cells` wide. Wider text is left as is.
pub fn align_right(s: &str, cells: usize) -> String {
    let pad = cells.saturating_sub(cell_width(s));
    let mut out = " ".repeat(pad);
    out.push_str(s);
    out
}

fn grapheme_cells(g: &str) -> usize {
    if g == "\t" { 1 } else { UnicodeWidthStr::width(g) }
}
