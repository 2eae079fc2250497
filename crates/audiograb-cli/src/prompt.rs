use anyhow::{bail, Result};
use audiograb_acquire::metadata::{review_table, MetadataField, OverrideProvider};
use audiograb_acquire::resolve_site;
use audiograb_model::{BookData, Site};
use std::io::{BufRead, Write};

fn read_line(input: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("Input closed");
    }
    Ok(line.trim().to_string())
}

/// Ask for a book URL until one from a supported site is entered.
pub fn ask_for_url(input: &mut impl BufRead, output: &mut impl Write) -> Result<(String, Site)> {
    loop {
        write!(output, "Enter the audiobook URL: ")?;
        output.flush()?;
        let url = read_line(input)?;
        if url.is_empty() {
            continue;
        }
        match resolve_site(&url) {
            Some(site) => return Ok((url, site)),
            None => writeln!(output, "Unsupported site: {url}")?,
        }
    }
}

/// Line-based review at a terminal: shows the scraped fields, asks once
/// whether to change anything, then offers each field in turn.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> OverrideProvider for LinePrompt<R, W> {
    fn review(&mut self, book: &BookData) -> Result<bool> {
        writeln!(self.output, "\n{}", review_table(book))?;
        loop {
            write!(self.output, "Do you want to change any details? (y/n): ")?;
            self.output.flush()?;
            match read_line(&mut self.input)?.to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Please answer y or n.")?,
            }
        }
    }

    fn replacement(&mut self, field: MetadataField, current: Option<&str>) -> Result<Option<String>> {
        write!(self.output, "{} [{}]: ", field.label(), current.unwrap_or("N/A"))?;
        self.output.flush()?;
        let answer = read_line(&mut self.input)?;
        Ok((!answer.is_empty()).then_some(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audiograb_acquire::metadata::apply_overrides;
    use audiograb_model::Chapter;
    use std::io::Cursor;

    fn book() -> BookData {
        let mut book = BookData::new(
            Site::HdAudiobooks,
            "Dune",
            "https://hdaudiobooks.net/dune/",
            vec![Chapter::numbered(1, "https://x.example/1.mp3")],
        )
        .unwrap();
        book.author = Some("Frank Herbert".into());
        book
    }

    #[test]
    fn test_ask_for_url_reprompts_until_supported() {
        let mut input = Cursor::new("\nhttps://example.com/book\nhttps://tokybook.com/post/dune\n");
        let mut output = Vec::new();
        let (url, site) = ask_for_url(&mut input, &mut output).unwrap();

        assert_eq!(url, "https://tokybook.com/post/dune");
        assert_eq!(site, Site::Tokybook);
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("Unsupported site: https://example.com/book"));
    }

    #[test]
    fn test_ask_for_url_fails_on_closed_input() {
        let mut input = Cursor::new("https://example.com/book\n");
        assert!(ask_for_url(&mut input, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_declining_keeps_scraped_values() {
        let mut book = book();
        let mut prompt = LinePrompt::new(Cursor::new("maybe\nn\n"), Vec::new());
        apply_overrides(&mut book, &mut prompt).unwrap();

        assert_eq!(book.title, "Dune");
        let shown = String::from_utf8(prompt.output).unwrap();
        assert!(shown.contains("Frank Herbert"));
        assert!(shown.contains("Please answer y or n."));
    }

    #[test]
    fn test_fields_are_offered_in_order_and_blank_keeps_current() {
        let mut book = book();
        let answers = "y\nDune Messiah\n\nScott Brick\n1969\n\n";
        let mut prompt = LinePrompt::new(Cursor::new(answers), Vec::new());
        apply_overrides(&mut book, &mut prompt).unwrap();

        assert_eq!(book.title, "Dune Messiah");
        assert_eq!(book.author.as_deref(), Some("Frank Herbert"));
        assert_eq!(book.narrator.as_deref(), Some("Scott Brick"));
        assert_eq!(book.year.as_deref(), Some("1969"));
        assert_eq!(book.cover_url, None);

        let shown = String::from_utf8(prompt.output).unwrap();
        assert!(shown.contains("[Frank Herbert]: "));
    }
}
