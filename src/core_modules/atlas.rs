// THEORY:
// The `Atlas` module is the last stop of the extraction pipeline. It takes
// ordered sequences of normalized frames (typically one sequence per animation
// phase) and lays them out on a grid of fixed-size cells.
//
// Two layouts are supported:
// 1.  **Pack**: build a fresh sheet with one row per sequence. The sheet is as
//     wide as the longest sequence.
// 2.  **Merge**: splice new rows into an existing, larger sprite sheet. The
//     base sheet is copied into the top-left of a new canvas untouched, the target
//     rows are wiped to transparent, and the new frames are pasted in by column.
//     Rows that are not targeted keep their previously authored pixels. The
//     canvas only ever grows: wider when a sequence has more frames than the
//     sheet has columns, taller when a target row lies past the last row.
//
// Composition never mutates its inputs. Each layout returns a new canvas plus a
// placement record (column, row, source box) per frame for the manifest writer.

use crate::core_modules::bounding_box::BoundingBox;
use crate::core_modules::frame_normalizer::NormalizedFrame;
use crate::error::{Result, SpriteError};
use image::imageops;
use image::RgbaImage;
use serde::Serialize;

/// Where a single frame landed on a composed sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub column: u32,
    pub row: u32,
    /// The tight region on the source sheet the frame was extracted from.
    pub source: BoundingBox,
}

/// A composed sheet and the placement of every frame on it.
#[derive(Debug, Clone)]
pub struct ComposedSheet {
    pub image: RgbaImage,
    pub columns: u32,
    pub rows: u32,
    pub placements: Vec<Placement>,
}

/// Grid geometry shared by every cell of an atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    pub cell_width: u32,
    pub cell_height: u32,
}

impl AtlasLayout {
    pub fn new(cell_width: u32, cell_height: u32) -> Self {
        Self {
            cell_width,
            cell_height,
        }
    }

    /// Square cells of `frame_size`.
    pub fn square(frame_size: u32) -> Self {
        Self::new(frame_size, frame_size)
    }

    /// How many whole cells fit across and down `image`.
    pub fn grid_of(&self, image: &RgbaImage) -> (u32, u32) {
        (
            image.width() / self.cell_width.max(1),
            image.height() / self.cell_height.max(1),
        )
    }

    /// Lays out each sequence on its own row of a new sheet, row `i` for sequence `i`.
    pub fn pack(&self, rows: &[&[NormalizedFrame]]) -> Result<ComposedSheet> {
        let columns = widest(rows.iter().copied());
        let row_count = rows.len() as u32;
        let mut sheet = ComposedSheet {
            image: RgbaImage::new(self.cell_width * columns, self.cell_height * row_count),
            columns,
            rows: row_count,
            placements: Vec::new(),
        };

        for (row, frames) in rows.iter().enumerate() {
            self.paste_row(&mut sheet, row as u32, frames)?;
        }

        tracing::info!(columns, rows = row_count, frames = sheet.placements.len(), "atlas packed");
        Ok(sheet)
    }

    /// Replaces the given rows of `base` with new frame sequences.
    ///
    /// `rows` pairs a target row index with the frames destined for it.
    pub fn merge(&self, base: &RgbaImage, rows: &[(u32, &[NormalizedFrame])]) -> Result<ComposedSheet> {
        let (base_columns, base_rows) = self.grid_of(base);
        let columns = base_columns.max(widest(rows.iter().map(|(_, frames)| *frames)));
        let row_count = rows
            .iter()
            .map(|(row, _)| row + 1)
            .fold(base_rows, u32::max);

        let mut image = RgbaImage::new(self.cell_width * columns, self.cell_height * row_count);
        imageops::replace(&mut image, base, 0, 0);

        let mut sheet = ComposedSheet {
            image,
            columns,
            rows: row_count,
            placements: Vec::new(),
        };

        // Wipe every target row before pasting so sequences sharing a row do
        // not erase each other.
        let blank_row = RgbaImage::new(sheet.image.width(), self.cell_height);
        for (row, _) in rows {
            self.clear_row(&mut sheet.image, &blank_row, *row);
        }
        for (row, frames) in rows {
            self.paste_row(&mut sheet, *row, frames)?;
        }

        tracing::info!(
            columns,
            rows = row_count,
            base_columns,
            base_rows,
            frames = sheet.placements.len(),
            "atlas rows merged"
        );
        Ok(sheet)
    }

    fn clear_row(&self, image: &mut RgbaImage, blank_row: &RgbaImage, row: u32) {
        imageops::replace(image, blank_row, 0, i64::from(row * self.cell_height));
    }

    fn paste_row(&self, sheet: &mut ComposedSheet, row: u32, frames: &[NormalizedFrame]) -> Result<()> {
        for (column, frame) in frames.iter().enumerate() {
            let (width, height) = frame.image.dimensions();
            if (width, height) != (self.cell_width, self.cell_height) {
                return Err(SpriteError::FrameSizeMismatch {
                    cell_width: self.cell_width,
                    cell_height: self.cell_height,
                    found_width: width,
                    found_height: height,
                });
            }

            let column = column as u32;
            imageops::replace(
                &mut sheet.image,
                &frame.image,
                i64::from(column * self.cell_width),
                i64::from(row * self.cell_height),
            );
            sheet.placements.push(Placement {
                column,
                row,
                source: frame.source_bounds,
            });
        }
        Ok(())
    }
}

fn widest<'a, I>(rows: I) -> u32
where
    I: Iterator<Item = &'a [NormalizedFrame]>,
{
    rows.map(|frames| frames.len() as u32).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const CELL: u32 = 8;

    fn solid_frame(color: [u8; 4], source: BoundingBox) -> NormalizedFrame {
        NormalizedFrame {
            image: RgbaImage::from_pixel(CELL, CELL, Rgba(color)),
            source_bounds: source,
            crop_bounds: source,
            scale: 1.0,
            offset_x: 0,
            offset_y: 0,
        }
    }

    fn cell_color(row: u32, column: u32) -> Rgba<u8> {
        Rgba([(row * 10) as u8, (column * 20) as u8, 77, 255])
    }

    fn authored_sheet(columns: u32, rows: u32) -> RgbaImage {
        RgbaImage::from_fn(columns * CELL, rows * CELL, |x, y| cell_color(y / CELL, x / CELL))
    }

    #[test]
    fn pack_places_sequences_on_their_rows() {
        let layout = AtlasLayout::square(CELL);
        let a: Vec<_> = (0..3)
            .map(|i| solid_frame([255, 0, 0, 255], BoundingBox::new(i, 0, i, 0)))
            .collect();
        let b = vec![solid_frame([0, 0, 255, 255], BoundingBox::new(9, 9, 9, 9))];

        let sheet = layout.pack(&[a.as_slice(), b.as_slice()]).unwrap();
        assert_eq!(sheet.image.dimensions(), (3 * CELL, 2 * CELL));
        assert_eq!((sheet.columns, sheet.rows), (3, 2));
        assert_eq!(sheet.image.get_pixel(2 * CELL + 1, 1), &Rgba([255, 0, 0, 255]));
        assert_eq!(sheet.image.get_pixel(1, CELL + 1), &Rgba([0, 0, 255, 255]));
        assert_eq!(sheet.image.get_pixel(CELL + 1, CELL + 1).0[3], 0);

        assert_eq!(sheet.placements.len(), 4);
        assert_eq!(
            sheet.placements[3],
            Placement {
                column: 0,
                row: 1,
                source: BoundingBox::new(9, 9, 9, 9)
            }
        );
    }

    #[test]
    fn merge_replaces_only_target_rows() {
        let layout = AtlasLayout::square(CELL);
        let base = authored_sheet(4, 16);
        let dash = vec![solid_frame([1, 2, 3, 255], BoundingBox::new(0, 0, 5, 5))];
        let slide = vec![solid_frame([4, 5, 6, 255], BoundingBox::new(6, 0, 9, 5))];

        let sheet = layout.merge(&base, &[(12, dash.as_slice()), (13, slide.as_slice())]).unwrap();
        assert_eq!(sheet.image.dimensions(), base.dimensions());
        assert_eq!((sheet.columns, sheet.rows), (4, 16));

        for y in 0..sheet.image.height() {
            for x in 0..sheet.image.width() {
                let (row, column) = (y / CELL, x / CELL);
                let got = *sheet.image.get_pixel(x, y);
                let expected = match (row, column) {
                    (12, 0) => Rgba([1, 2, 3, 255]),
                    (13, 0) => Rgba([4, 5, 6, 255]),
                    (12 | 13, _) => Rgba([0, 0, 0, 0]),
                    _ => *base.get_pixel(x, y),
                };
                assert_eq!(got, expected, "pixel ({x}, {y})");
            }
        }
        assert_eq!(
            sheet.placements,
            vec![
                Placement { column: 0, row: 12, source: BoundingBox::new(0, 0, 5, 5) },
                Placement { column: 0, row: 13, source: BoundingBox::new(6, 0, 9, 5) },
            ]
        );
    }

    #[test]
    fn merge_grows_to_fit_wider_and_lower_rows() {
        let layout = AtlasLayout::square(CELL);
        let base = authored_sheet(2, 3);
        let long: Vec<_> = (0..5)
            .map(|_| solid_frame([9, 9, 9, 255], BoundingBox::new(0, 0, 0, 0)))
            .collect();

        let sheet = layout.merge(&base, &[(4, long.as_slice())]).unwrap();
        assert_eq!((sheet.columns, sheet.rows), (5, 5));
        assert_eq!(sheet.image.dimensions(), (5 * CELL, 5 * CELL));
        assert_eq!(sheet.image.get_pixel(1, 1), base.get_pixel(1, 1));
        // New columns beside authored rows stay transparent.
        assert_eq!(sheet.image.get_pixel(3 * CELL, 1).0[3], 0);
        assert_eq!(sheet.image.get_pixel(4 * CELL + 2, 4 * CELL + 2), &Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn merge_leaves_the_base_sheet_untouched() {
        let layout = AtlasLayout::square(CELL);
        let base = authored_sheet(2, 2);
        let before = base.clone();
        let frames = vec![solid_frame([0, 0, 0, 255], BoundingBox::new(0, 0, 0, 0))];
        layout.merge(&base, &[(0, frames.as_slice())]).unwrap();
        assert_eq!(base, before);
    }

    #[test]
    fn wrong_frame_size_is_rejected() {
        let layout = AtlasLayout::square(16);
        let frames = vec![solid_frame([0, 0, 0, 255], BoundingBox::new(0, 0, 0, 0))];
        assert!(matches!(
            layout.pack(&[frames.as_slice()]),
            Err(SpriteError::FrameSizeMismatch { found_width: 8, .. })
        ));
    }

    #[test]
    fn merge_clears_target_row_across_grown_columns() {
        let layout = AtlasLayout::square(CELL);
        let base = authored_sheet(3, 4);
        let short = vec![solid_frame([7, 7, 7, 255], BoundingBox::new(0, 0, 0, 0))];
        let long: Vec<_> = (0..5)
            .map(|_| solid_frame([8, 8, 8, 255], BoundingBox::new(0, 0, 0, 0)))
            .collect();

        let sheet = layout.merge(&base, &[(1, short.as_slice()), (3, long.as_slice())]).unwrap();
        assert_eq!((sheet.columns, sheet.rows), (5, 4));
        for x in CELL..5 * CELL {
            for y in CELL..2 * CELL {
                assert_eq!(sheet.image.get_pixel(x, y).0[3], 0, "pixel ({x}, {y})");
            }
        }
        assert_eq!(sheet.image.get_pixel(1, CELL + 1), &Rgba([7, 7, 7, 255]));
        assert_eq!(sheet.image.get_pixel(2 * CELL + 1, 2 * CELL + 1), base.get_pixel(2 * CELL + 1, 2 * CELL + 1));
    }
}
