/*++

Licensed under the Apache-2.0 license.

File Name:

    address.rs

Abstract:

    File contains the page/row/column addressing of individual fuse bits.

--*/

use bitfield::bitfield;

use super::regs::{COLS_PER_ROW, ROWS_PER_PAGE};
use hsm_error::{HsmError, HsmResult};

/// Physical fuse array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Page0 = 0,
    Page1 = 1,
    Page2 = 2,
}

impl From<Page> for u32 {
    fn from(page: Page) -> Self {
        page as u32
    }
}

bitfield! {
    /// Address word accepted by the program and read address registers
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    struct BitAddr(u32);

    pub u32, _, set_page: 14, 13;
    pub u32, _, set_row: 12, 5;
    pub u32, _, set_col: 4, 0;
}

/// Location of one fuse bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuseAddress {
    page: Page,
    row: u32,
    col: u32,
}

impl FuseAddress {
    /// Create a bit address.
    ///
    /// # Arguments
    ///
    /// * `page` - Fuse array
    /// * `row` - Row within the page
    /// * `col` - Bit within the row
    ///
    /// # Returns
    ///
    /// `DRIVER_EFUSE_INVALID_PARAM` unless `row < ROWS_PER_PAGE` and `col < COLS_PER_ROW`
    pub fn new(page: Page, row: u32, col: u32) -> HsmResult<Self> {
        if row >= ROWS_PER_PAGE || col >= COLS_PER_ROW {
            return Err(HsmError::DRIVER_EFUSE_INVALID_PARAM);
        }
        Ok(Self { page, row, col })
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn col(&self) -> u32 {
        self.col
    }

    /// Value for the program address register: `page << 13 | row << 5 | col`.
    pub fn pgm_addr(&self) -> u32 {
        let mut addr = BitAddr(0);
        addr.set_page(self.page.into());
        addr.set_row(self.row);
        addr.set_col(self.col);
        addr.0
    }

    /// Value for the read address register; reads select a whole row.
    pub fn rd_addr(&self) -> u32 {
        let mut addr = BitAddr(0);
        addr.set_page(self.page.into());
        addr.set_row(self.row);
        addr.0
    }

    /// Index of the containing row in the cache mirror.
    pub fn cache_index(&self) -> u32 {
        cache_index(self.page, self.row)
    }
}

/// Index of `(page, row)` in the cache mirror.
pub fn cache_index(page: Page, row: u32) -> u32 {
    u32::from(page) * ROWS_PER_PAGE + row
}
