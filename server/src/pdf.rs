//! Lays out and draws the PDF management report.
//!
//! The report is first described as a list of [Block]s, which keeps the
//! content decisions (what goes in which section, row caps, truncation)
//! separate from drawing. [render] then places the blocks top to bottom on A4
//! pages, breaking pages as needed and stamping a footer on each one.

use crate::error::ApiError;
use chrono::{NaiveDate, NaiveDateTime};
use cmms_common::reports::{ReportData, ReportSection};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerIndex,
    PdfLayerReference, PdfPageIndex, Point, Rect, Rgb,
};
use std::collections::BTreeMap;
use thiserror::Error;

/// Tables of maintenance and activities stop after this many rows
pub const MAX_TABLE_ROWS: usize = 15;

const ORGANISER_CHARS: usize = 25;
const SCHOOL_CHARS: usize = 20;
const CHART_LABEL_CHARS: usize = 20;
const MAX_BARS: usize = 12;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const CONTENT_TOP: f32 = PAGE_HEIGHT - MARGIN;
const CONTENT_BOTTOM: f32 = 25.0;

const PT_TO_MM: f32 = 0.3528;
const ROW_HEIGHT: f32 = 7.0;
const CHART_HEIGHT: f32 = 75.0;
const KPI_HEIGHT: f32 = 24.0;

const RED: (f32, f32, f32) = (0.651, 0.098, 0.180);
const GRAY: (f32, f32, f32) = (0.365, 0.365, 0.365);
const LIGHT_GRAY: (f32, f32, f32) = (0.910, 0.910, 0.910);
const BLACK: (f32, f32, f32) = (0.0, 0.0, 0.0);
const WHITE: (f32, f32, f32) = (1.0, 1.0, 1.0);

#[derive(Debug, Error)]
#[error("Unable to render PDF report: {0}")]
pub struct RenderError(String);

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// A piece of report content, drawn in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title { title: String, subtitle: String, generated: String },
    Heading(String),
    Paragraph(String),

    /// Big numbers with a label underneath, side by side
    Kpis(Vec<(String, String)>),
    Table { title: String, headers: Vec<String>, rows: Vec<Vec<String>> },
    BarChart { title: String, bars: Vec<(String, i64)> },
    PageBreak,
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn text_or_blank(text: Option<&str>) -> String {
    text.unwrap_or_default().to_owned()
}

/// Sums values per label, keeping the order labels first appear in.
fn total_by<'a>(rows: impl Iterator<Item = (&'a str, i64)>) -> Vec<(String, i64)> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: BTreeMap<String, i64> = BTreeMap::new();

    for (label, value) in rows {
        if !totals.contains_key(label) {
            order.push(label.to_owned());
        }
        *totals.entry(label.to_owned()).or_default() += value;
    }

    order
        .into_iter()
        .take(MAX_BARS)
        .map(|label| {
            let total = totals.get(&label).copied().unwrap_or_default();
            (truncate(&label, CHART_LABEL_CHARS), total)
        })
        .collect()
}

fn table(title: &str, headers: &[&str], rows: Vec<Vec<String>>) -> Block {
    Block::Table {
        title: title.to_owned(),
        headers: headers.iter().map(|h| (*h).to_owned()).collect(),
        rows,
    }
}

/// Describes the report for the given sections. Sections come in report
/// order, the first one shares the page with the title and every other one
/// starts a new page.
pub fn build_blocks(data: &ReportData, sections: &[ReportSection], generated: NaiveDateTime) -> Vec<Block> {
    let mut blocks = vec![Block::Title {
        title: "CMMS".to_owned(),
        subtitle: "Comprehensive Management Report".to_owned(),
        generated: format!("Generated: {}", generated.format("%Y-%m-%d %H:%M:%S")),
    }];

    for (index, section) in sections.iter().enumerate() {
        if index > 0 {
            blocks.push(Block::PageBreak);
        }

        blocks.push(Block::Heading(section.title().to_owned()));

        match section {
            ReportSection::ExecutiveSummary => executive_summary(data, &mut blocks),
            ReportSection::Maintenance => maintenance(data, &mut blocks),
            ReportSection::Personnel => personnel(data, &mut blocks),
            ReportSection::Activities => activities(data, &mut blocks),
            ReportSection::Schools => schools(data, &mut blocks),
            ReportSection::Safety => safety(data, &mut blocks),
        }
    }

    blocks
}

fn executive_summary(data: &ReportData, blocks: &mut Vec<Block>) {
    let summary = &data.summary;
    blocks.push(Block::Kpis(vec![
        ("Total Personnel".to_owned(), summary.total_persons.to_string()),
        ("Departments".to_owned(), summary.total_schools.to_string()),
        ("Activities".to_owned(), summary.total_activities.to_string()),
        ("Maintenance Tasks".to_owned(), summary.total_maintenance.to_string()),
    ]));
}

fn maintenance(data: &ReportData, blocks: &mut Vec<Block>) {
    let rows = &data.maintenance_summary;
    if rows.is_empty() {
        blocks.push(Block::Paragraph("No maintenance tasks to report.".to_owned()));
        return;
    }

    blocks.push(Block::BarChart {
        title: "Maintenance Tasks by Building".to_owned(),
        bars: total_by(rows.iter().map(|r| (r.building.as_str(), r.count))),
    });

    let rows = rows
        .iter()
        .take(MAX_TABLE_ROWS)
        .map(|r| vec![r.kind.to_owned(), r.building.to_owned(), text_or_blank(r.campus.as_deref()), r.count.to_string()])
        .collect();
    blocks.push(table("Maintenance Summary Table", &["Type", "Building", "Campus", "Count"], rows));
}

fn personnel(data: &ReportData, blocks: &mut Vec<Block>) {
    let rows = &data.people_summary;
    if rows.is_empty() {
        blocks.push(Block::Paragraph("No profiles to report.".to_owned()));
        return;
    }

    blocks.push(Block::BarChart {
        title: "Personnel Distribution by Role".to_owned(),
        bars: total_by(rows.iter().map(|r| (r.job_role.as_str(), r.count))),
    });

    let rows =
        rows.iter().map(|r| vec![r.job_role.to_owned(), r.status.to_owned(), r.count.to_string()]).collect();
    blocks.push(table("Personnel by Role and Status", &["Job Role", "Status", "Count"], rows));
}

fn activities(data: &ReportData, blocks: &mut Vec<Block>) {
    let rows = &data.activities_summary;
    if rows.is_empty() {
        blocks.push(Block::Paragraph("No activities to report.".to_owned()));
        return;
    }

    blocks.push(Block::BarChart {
        title: "Activities by Type".to_owned(),
        bars: total_by(rows.iter().map(|r| (r.kind.as_deref().unwrap_or("Unspecified"), r.activity_count))),
    });

    let rows = rows
        .iter()
        .take(MAX_TABLE_ROWS)
        .map(|r| {
            vec![
                text_or_blank(r.kind.as_deref()),
                truncate(&r.organiser_name, ORGANISER_CHARS),
                r.activity_count.to_string(),
            ]
        })
        .collect();
    blocks.push(table("Activities Summary", &["Type", "Organiser", "Count"], rows));
}

fn schools(data: &ReportData, blocks: &mut Vec<Block>) {
    let rows = &data.school_stats;
    if rows.is_empty() {
        blocks.push(Block::Paragraph("No departments to report.".to_owned()));
        return;
    }

    blocks.push(Block::BarChart {
        title: "Affiliated Personnel by Department".to_owned(),
        bars: total_by(rows.iter().map(|r| (r.school_name.as_str(), r.affiliated_people))),
    });

    let rows = rows
        .iter()
        .map(|r| {
            vec![
                r.department.to_owned(),
                truncate(&r.school_name, SCHOOL_CHARS),
                truncate(r.faculty.as_deref().unwrap_or_default(), SCHOOL_CHARS),
                r.affiliated_people.to_string(),
                r.locations_count.to_string(),
            ]
        })
        .collect();
    blocks.push(table("Department Overview", &["Department", "School Name", "Faculty", "Personnel", "Locations"], rows));
}

fn safety(data: &ReportData, blocks: &mut Vec<Block>) {
    blocks.push(Block::Paragraph(format!(
        "Chemical Hazard Tasks: {} cleaning tasks involve active chemicals requiring special safety precautions.",
        data.chemical_tasks
    )));

    if !data.maintenance_frequency.is_empty() {
        let rows = data
            .maintenance_frequency
            .iter()
            .map(|r| vec![text_or_blank(r.frequency.as_deref()), r.kind.to_owned(), r.task_count.to_string()])
            .collect();
        blocks.push(table("Maintenance Frequency Analysis", &["Frequency", "Type", "Task Count"], rows));
    }
}

fn color((r, g, b): (f32, f32, f32)) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

/// Helvetica averages about half an em per character, close enough for
/// fitting text into cells.
fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5 * PT_TO_MM
}

/// Cuts the text down to what fits in the given width.
fn fit(text: &str, width: f32, size: f32) -> String {
    let max = (width / (size * 0.5 * PT_TO_MM)).floor().max(1.0) as usize;
    truncate(text, max)
}

/// Breaks text into lines no wider than the content area.
fn wrap(text: &str, size: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let candidate = if line.is_empty() { word.to_owned() } else { format!("{} {}", line, word) };

        if text_width(&candidate, size) > CONTENT_WIDTH && !line.is_empty() {
            lines.push(std::mem::replace(&mut line, word.to_owned()));
        } else {
            line = candidate;
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }

    lines
}

/// The document being drawn and where the next block goes.
struct Canvas {
    doc: PdfDocumentReference,
    pages: Vec<(PdfPageIndex, PdfLayerIndex)>,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,

    /// Distance of the next line from the bottom of the page, in mm
    y: f32,
}

impl Canvas {
    fn new(title: &str) -> Result<Self, RenderError> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(|e| RenderError(format!("{:?}", e)))?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(|e| RenderError(format!("{:?}", e)))?;
        let current = doc.get_page(page).get_layer(layer);

        Ok(Canvas { doc, pages: vec![(page, layer)], layer: current, regular, bold, y: CONTENT_TOP })
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.pages.push((page, layer));
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = CONTENT_TOP;
    }

    /// Starts a new page unless the given height still fits on this one.
    fn reserve(&mut self, height: f32) {
        if self.y - height < CONTENT_BOTTOM {
            self.new_page();
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, y: f32, bold: bool, fill: (f32, f32, f32)) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.set_fill_color(color(fill));
        self.layer.use_text(text, size, Mm(x), Mm(y), font);
    }

    fn fill_rect(&self, x: f32, y: f32, width: f32, height: f32, fill: (f32, f32, f32)) {
        self.layer.set_fill_color(color(fill));
        self.layer.add_rect(Rect::new(Mm(x), Mm(y), Mm(x + width), Mm(y + height)));
    }

    fn line(&self, points: &[(f32, f32)], closed: bool, stroke: (f32, f32, f32), thickness: f32) {
        self.layer.set_outline_color(color(stroke));
        self.layer.set_outline_thickness(thickness);
        self.layer.add_line(Line {
            points: points.iter().map(|(x, y)| (Point::new(Mm(*x), Mm(*y)), false)).collect(),
            is_closed: closed,
        });
    }

    fn draw(&mut self, block: &Block) {
        match block {
            Block::Title { title, subtitle, generated } => self.draw_title(title, subtitle, generated),
            Block::Heading(heading) => {
                self.reserve(14.0);
                self.y -= 8.0;
                self.text(heading, 14.0, MARGIN, self.y, true, RED);
                self.y -= 6.0;
            }
            Block::Paragraph(paragraph) => {
                for line in wrap(paragraph, 10.0) {
                    self.reserve(5.0);
                    self.y -= 5.0;
                    self.text(&line, 10.0, MARGIN, self.y, false, BLACK);
                }
                self.y -= 5.0;
            }
            Block::Kpis(kpis) => self.draw_kpis(kpis),
            Block::Table { title, headers, rows } => self.draw_table(title, headers, rows),
            Block::BarChart { title, bars } => self.draw_bar_chart(title, bars),
            Block::PageBreak => self.new_page(),
        }
    }

    fn draw_title(&mut self, title: &str, subtitle: &str, generated: &str) {
        self.y -= 8.0;
        self.text(title, 22.0, MARGIN, self.y, true, RED);
        self.y -= 9.0;
        self.text(subtitle, 14.0, MARGIN, self.y, true, GRAY);
        self.y -= 7.0;
        self.text(generated, 10.0, MARGIN, self.y, false, GRAY);
        self.y -= 5.0;
        self.line(&[(MARGIN, self.y), (PAGE_WIDTH - MARGIN, self.y)], false, RED, 2.0);
        self.y -= 6.0;
    }

    fn draw_kpis(&mut self, kpis: &[(String, String)]) {
        if kpis.is_empty() {
            return;
        }

        self.reserve(KPI_HEIGHT + 6.0);
        let width = CONTENT_WIDTH / kpis.len() as f32;
        let bottom = self.y - KPI_HEIGHT;

        for (i, (label, value)) in kpis.iter().enumerate() {
            let x = MARGIN + i as f32 * width;
            let value_x = x + (width - text_width(value, 18.0)) / 2.0;
            let label = fit(label, width - 2.0, 9.0);
            let label_x = x + (width - text_width(&label, 9.0)) / 2.0;

            self.line(
                &[(x, bottom), (x + width, bottom), (x + width, self.y), (x, self.y)],
                true,
                LIGHT_GRAY,
                1.0,
            );
            self.text(value, 18.0, value_x, bottom + 12.0, true, RED);
            self.text(&label, 9.0, label_x, bottom + 5.0, false, GRAY);
        }

        self.y = bottom - 6.0;
    }

    fn draw_table_row(&mut self, cells: &[String], header: bool, shaded: bool) {
        let width = CONTENT_WIDTH / cells.len().max(1) as f32;
        let size = if header { 10.0 } else { 9.0 };
        let bottom = self.y - ROW_HEIGHT;

        if header {
            self.fill_rect(MARGIN, bottom, CONTENT_WIDTH, ROW_HEIGHT, RED);
        } else if shaded {
            self.fill_rect(MARGIN, bottom, CONTENT_WIDTH, ROW_HEIGHT, LIGHT_GRAY);
        }

        for (i, cell) in cells.iter().enumerate() {
            let x = MARGIN + i as f32 * width;
            let fill = if header { WHITE } else { BLACK };
            self.text(&fit(cell, width - 3.0, size), size, x + 1.5, bottom + 2.2, header, fill);
        }

        self.y = bottom;
    }

    fn draw_table(&mut self, title: &str, headers: &[String], rows: &[Vec<String>]) {
        // keep the title with the header and first row
        self.reserve(10.0 + 2.0 * ROW_HEIGHT);
        self.y -= 6.0;
        self.text(title, 12.0, MARGIN, self.y, true, RED);
        self.y -= 4.0;

        self.draw_table_row(headers, true, false);

        for (i, row) in rows.iter().enumerate() {
            if self.y - ROW_HEIGHT < CONTENT_BOTTOM {
                self.new_page();
                self.draw_table_row(headers, true, false);
            }

            self.draw_table_row(row, false, i % 2 == 1);
        }

        self.y -= 8.0;
    }

    fn draw_bar_chart(&mut self, title: &str, bars: &[(String, i64)]) {
        if bars.is_empty() {
            return;
        }

        self.reserve(CHART_HEIGHT);
        self.y -= 6.0;
        self.text(title, 12.0, MARGIN, self.y, true, RED);

        let plot_height = 45.0;
        let base = self.y - 10.0 - plot_height;
        let left = MARGIN + 5.0;
        let width = CONTENT_WIDTH - 5.0;
        let slot = width / bars.len() as f32;
        let bar_width = slot * 0.6;
        let max = bars.iter().map(|(_, value)| *value).max().unwrap_or_default().max(1) as f32;

        for (i, (label, value)) in bars.iter().enumerate() {
            let height = (*value).max(0) as f32 / max * plot_height;
            let center = left + i as f32 * slot + slot / 2.0;
            let value_text = value.to_string();
            let label = fit(label, slot - 1.0, 7.0);

            self.fill_rect(center - bar_width / 2.0, base, bar_width, height, RED);
            self.text(&value_text, 7.0, center - text_width(&value_text, 7.0) / 2.0, base + height + 1.5, false, GRAY);
            self.text(&label, 7.0, center - text_width(&label, 7.0) / 2.0, base - 4.0, false, GRAY);
        }

        self.line(&[(left, base), (left + width, base)], false, GRAY, 0.5);
        self.y = base - 10.0;
    }

    /// Stamps the footer on every page and serializes the document.
    fn finish(self, generated: NaiveDate) -> Result<Vec<u8>, RenderError> {
        let footer = format!("CMMS Report | Generated {}", generated.format("%Y-%m-%d"));

        for (number, (page, layer)) in self.pages.iter().enumerate() {
            let layer = self.doc.get_page(*page).get_layer(*layer);
            let page_label = format!("Page {}", number + 1);

            layer.set_outline_color(color(RED));
            layer.set_outline_thickness(1.0);
            layer.add_line(Line {
                points: vec![
                    (Point::new(Mm(MARGIN), Mm(19.0)), false),
                    (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(19.0)), false),
                ],
                is_closed: false,
            });

            layer.set_fill_color(color(GRAY));
            layer.use_text(footer.as_str(), 8.0, Mm(MARGIN), Mm(13.0), &self.regular);
            layer.use_text(
                page_label.as_str(),
                8.0,
                Mm(PAGE_WIDTH - MARGIN - text_width(&page_label, 8.0)),
                Mm(13.0),
                &self.regular,
            );
        }

        self.doc.save_to_bytes().map_err(|e| RenderError(format!("{:?}", e)))
    }
}

/// Draws the blocks into a PDF document and returns its bytes.
pub fn render(blocks: &[Block], generated: NaiveDate) -> Result<Vec<u8>, RenderError> {
    let mut canvas = Canvas::new("CMMS Report")?;

    for block in blocks {
        canvas.draw(block);
    }

    canvas.finish(generated)
}
