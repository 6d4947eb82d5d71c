//! Workbook layout: sheet name, column widths, header/row styling and the
//! picklist dropdowns.

use rust_xlsxwriter::{
    Color, DataValidation, Format, FormatAlign, FormatBorder, FormatPattern, Worksheet, XlsxError,
};

use crate::pipeline::types::{FIELD_COUNT, Field, FieldSchema};

pub const SHEET_NAME: &str = "Incidents";

/// Column widths in character units, in field order.
pub const COLUMN_WIDTHS: [f64; FIELD_COUNT] = [12.0, 12.0, 40.0, 18.0, 22.0, 28.0, 28.0, 48.0];

/// Last 1-based sheet row covered by the picklist dropdowns. Rows beyond it
/// are written normally but without dropdown enforcement.
pub const DROPDOWN_LAST_ROW: u32 = 5000;

const HEADER_FILL: u32 = 0xE67E22;
const SHADED_ROW_FILL: u32 = 0xDCEAF7;
const PLAIN_ROW_FILL: u32 = 0xFFFFFF;

/// Short, enumerated columns are centred; free text wraps from the top.
fn is_centered(field: Field) -> bool {
    matches!(
        field,
        Field::Date | Field::Location | Field::Category | Field::ReportType | Field::OperationActivity
    )
}

pub fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::Black)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_pattern(FormatPattern::Solid)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::Black)
}

/// Style for one data cell. `data_row` is 1-based (the first row under the
/// header is 1); odd rows are shaded.
pub fn cell_format(field: Field, data_row: u32) -> Format {
    let fill = if data_row % 2 == 1 { SHADED_ROW_FILL } else { PLAIN_ROW_FILL };

    let format = Format::new()
        .set_background_color(Color::RGB(fill))
        .set_pattern(FormatPattern::Solid)
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::Black);

    if is_centered(field) {
        format.set_align(FormatAlign::VerticalCenter)
    } else {
        format.set_text_wrap().set_align(FormatAlign::Top)
    }
}

/// Header row, widths, frozen header, autofilter and dropdowns.
/// `last_row` is the 0-based index of the last written data row (0 when the
/// table is empty).
pub fn apply_sheet_layout(sheet: &mut Worksheet, last_row: u32) -> Result<(), XlsxError> {
    sheet.set_name(SHEET_NAME)?;

    let header = header_format();
    for field in Field::ALL {
        let col = field.index() as u16;
        sheet.write_string_with_format(0, col, field.name(), &header)?;
        sheet.set_column_width(col, COLUMN_WIDTHS[field.index()])?;
    }

    sheet.set_freeze_panes(1, 0)?;
    sheet.autofilter(0, 0, last_row, (FIELD_COUNT - 1) as u16)?;

    for (field, values) in FieldSchema::picklists() {
        let validation = DataValidation::new()
            .allow_list_strings(values)?
            .ignore_blank(true);
        let col = field.index() as u16;
        sheet.add_data_validation(1, col, DROPDOWN_LAST_ROW - 1, col, &validation)?;
    }

    Ok(())
}
