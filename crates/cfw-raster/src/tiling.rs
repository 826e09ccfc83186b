//! Fixed-size window grid shared by the Predictor (C5) and the
//! Composite Builder's window-wise reduction (C6): both walk the same
//! 512x512 source-CRS tiling.

/// One window's offset and size, in source-raster pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub xoff: usize,
    pub yoff: usize,
    pub xsize: usize,
    pub ysize: usize,
}

/// Tiles a `width` x `height` raster into `window_size`-square windows,
/// row-major, with a trailing partial window at each edge when the
/// raster dimensions aren't an exact multiple.
pub fn window_grid(width: usize, height: usize, window_size: usize) -> Vec<Window> {
    let mut windows = Vec::new();
    let mut yoff = 0;
    while yoff < height {
        let ysize = window_size.min(height - yoff);
        let mut xoff = 0;
        while xoff < width {
            let xsize = window_size.min(width - xoff);
            windows.push(Window { xoff, yoff, xsize, ysize });
            xoff += window_size;
        }
        yoff += window_size;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_multiple_tiles_cleanly() {
        let windows = window_grid(1024, 512, 512);
        assert_eq!(windows.len(), 2);
        assert!(windows.iter().all(|w| w.xsize == 512 && w.ysize == 512));
    }

    #[test]
    fn trailing_partial_window_at_edges() {
        let windows = window_grid(600, 600, 512);
        assert_eq!(windows.len(), 4);
        let last = windows.iter().find(|w| w.xoff == 512 && w.yoff == 512).unwrap();
        assert_eq!(last.xsize, 88);
        assert_eq!(last.ysize, 88);
    }
}
