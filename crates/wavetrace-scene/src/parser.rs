use std::str::FromStr;

use crate::description::{Material, SceneDescription, Sphere};
use crate::error::ParseError;
use crate::lexer::{Lexer, Token};

// ── Parser ────────────────────────────────────────────────────────────────

pub struct Parser<'s> {
    tokens: Vec<Token<'s>>,
    pos: usize,
}

impl<'s> Parser<'s> {
    pub fn new(tokens: Vec<Token<'s>>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current_pos(&self) -> (usize, usize) {
        self.tokens
            .get(self.pos)
            .map(|t| (t.line, t.col))
            .or_else(|| self.tokens.last().map(|t| (t.line, t.col + t.text.len())))
            .unwrap_or((1, 1))
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        let (line, col) = self.current_pos();
        ParseError::new(msg, line, col)
    }

    fn expect<T: FromStr>(&mut self, what: &str) -> Result<T, ParseError> {
        let Some(tok) = self.tokens.get(self.pos) else {
            return Err(self.err(format!("unexpected end of file, expected {}", what)));
        };
        let value = tok.text.parse::<T>().map_err(|_| {
            ParseError::new(format!("expected {}, got {:?}", what, tok.text), tok.line, tok.col)
        })?;
        self.pos += 1;
        Ok(value)
    }

    fn expect_positive(&mut self, what: &str) -> Result<u32, ParseError> {
        let (line, col) = self.current_pos();
        let value: u32 = self.expect(what)?;
        if value == 0 {
            return Err(ParseError::new(format!("{} must be greater than zero", what), line, col));
        }
        Ok(value)
    }

    fn expect_finite(&mut self, what: &str) -> Result<f32, ParseError> {
        let (line, col) = self.current_pos();
        let value: f32 = self.expect(what)?;
        if !value.is_finite() {
            return Err(ParseError::new(format!("{} must be finite, got {}", what, value), line, col));
        }
        Ok(value)
    }

    fn expect_rgb(&mut self, what: &str) -> Result<[f32; 3], ParseError> {
        Ok([self.expect_finite(what)?, self.expect_finite(what)?, self.expect_finite(what)?])
    }

    /// Item count that the remaining tokens can actually supply.
    fn expect_count(&mut self, what: &str, tokens_per_item: usize) -> Result<usize, ParseError> {
        let (line, col) = self.current_pos();
        let count: u32 = self.expect(what)?;
        let count = count as usize;
        let remaining = self.tokens.len() - self.pos;
        if count.saturating_mul(tokens_per_item) > remaining {
            return Err(ParseError::new(
                format!(
                    "{} is {} but only {} values follow ({} per item)",
                    what, count, remaining, tokens_per_item
                ),
                line,
                col,
            ));
        }
        Ok(count)
    }

    // ── Document ──────────────────────────────────────────────────────────

    pub fn parse_document(&mut self) -> Result<SceneDescription, ParseError> {
        let image_width = self.expect_positive("image width")?;
        let image_height = self.expect_positive("image height")?;
        let tile_width = self.expect_positive("tile width")?;
        let tile_height = self.expect_positive("tile height")?;
        let pixel_samples = self.expect_positive("samples per pixel")?;

        let num_materials = self.expect_count("material count", 6)?;
        let mut materials = Vec::with_capacity(num_materials);
        for _ in 0..num_materials {
            materials.push(self.parse_material()?);
        }

        let num_spheres = self.expect_count("sphere count", 5)?;
        let mut spheres = Vec::with_capacity(num_spheres);
        for _ in 0..num_spheres {
            spheres.push(self.parse_sphere(materials.len())?);
        }

        if self.pos < self.tokens.len() {
            return Err(self.err("unexpected trailing data after the last sphere"));
        }

        Ok(SceneDescription {
            image_width,
            image_height,
            tile_width,
            tile_height,
            pixel_samples,
            materials,
            spheres,
        })
    }

    // ── Material ──────────────────────────────────────────────────────────

    fn parse_material(&mut self) -> Result<Material, ParseError> {
        let reflectance = self.expect_rgb("material reflectance")?;
        let emission = self.expect_rgb("material emission")?;
        Ok(Material { reflectance, emission })
    }

    // ── Sphere ────────────────────────────────────────────────────────────

    fn parse_sphere(&mut self, num_materials: usize) -> Result<Sphere, ParseError> {
        let center = self.expect_rgb("sphere center")?;

        let (line, col) = self.current_pos();
        let radius: f32 = self.expect("sphere radius")?;
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(ParseError::new(
                format!("sphere radius must be positive, got {}", radius),
                line,
                col,
            ));
        }

        let (line, col) = self.current_pos();
        let material: u32 = self.expect("sphere material index")?;
        if material as usize >= num_materials {
            return Err(ParseError::new(
                format!(
                    "material index {} out of range ({} materials defined)",
                    material, num_materials
                ),
                line,
                col,
            ));
        }

        Ok(Sphere { center, radius, material })
    }
}

// ── Public parse entry point ──────────────────────────────────────────────

/// Parse scene source text into a [`SceneDescription`].
pub fn parse_str(src: &str) -> Result<SceneDescription, ParseError> {
    let tokens = Lexer::new(src).tokenize()?;
    Parser::new(tokens).parse_document()
}
