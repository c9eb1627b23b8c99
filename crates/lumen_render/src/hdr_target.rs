//! HDR Render Target
//!
//! Owns the floating-point color attachment and depth attachment the scene is
//! rendered into, one pair per presentation buffer. Attachments can be
//! created internally or supplied by the caller; supplied attachments are
//! never destroyed or recreated by this type.

use lumen_core::{LumenError, Result};

use crate::device::{RenderDevice, TargetDesc, TargetFormat, TextureHandle};

/// An attachment and who is responsible for destroying it.
#[derive(Debug, Clone)]
pub enum Attachment<T> {
    /// Created by the render target; destroyed on resize and destroy.
    Owned(T),
    /// Supplied by the caller; kept as-is.
    External(T),
}

impl<T> Attachment<T> {
    #[inline]
    pub fn get(&self) -> &T {
        match self {
            Self::Owned(t) | Self::External(t) => t,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }
}

pub struct HdrRenderTarget<D: RenderDevice> {
    colors: Vec<Attachment<D::Texture>>,
    depths: Vec<Attachment<D::DepthTexture>>,
    format: TargetFormat,
    width: u32,
    height: u32,
}

impl<D: RenderDevice> HdrRenderTarget<D> {
    /// Creates `buffer_count` color+depth pairs of `width × height`.
    pub fn new(
        device: &mut D,
        width: u32,
        height: u32,
        buffer_count: usize,
        format: TargetFormat,
    ) -> Result<Self> {
        assert!(buffer_count > 0, "HDR render target needs at least one buffer");
        let mut target = Self {
            colors: Vec::with_capacity(buffer_count),
            depths: Vec::with_capacity(buffer_count),
            format,
            width,
            height,
        };
        for i in 0..buffer_count {
            if let Err(e) = target.push_owned_pair(device, i) {
                target.destroy(device);
                return Err(e);
            }
        }
        log::info!("HDR render target: {buffer_count} x {width}x{height} {format:?}");
        Ok(target)
    }

    /// Wraps caller-supplied color attachments and creates a depth attachment
    /// for each.
    pub fn with_external_colors(device: &mut D, colors: Vec<D::Texture>) -> Result<Self> {
        let (width, height, format) = Self::describe(&colors);
        let mut target = Self {
            colors: colors.into_iter().map(Attachment::External).collect(),
            depths: Vec::new(),
            format,
            width,
            height,
        };
        for i in 0..target.colors.len() {
            match device.create_depth_target(&format!("HDR Depth {i}"), width, height) {
                Ok(depth) => target.depths.push(Attachment::Owned(depth)),
                Err(e) => {
                    target.destroy(device);
                    return Err(e);
                }
            }
        }
        Ok(target)
    }

    /// Wraps caller-supplied color and depth attachments. Nothing is created.
    #[must_use]
    pub fn with_external(colors: Vec<D::Texture>, depths: Vec<D::DepthTexture>) -> Self {
        assert_eq!(
            colors.len(),
            depths.len(),
            "one depth attachment is required per color attachment"
        );
        let (width, height, format) = Self::describe(&colors);
        Self {
            colors: colors.into_iter().map(Attachment::External).collect(),
            depths: depths.into_iter().map(Attachment::External).collect(),
            format,
            width,
            height,
        }
    }

    fn describe(colors: &[D::Texture]) -> (u32, u32, TargetFormat) {
        let first = colors
            .first()
            .expect("HDR render target needs at least one color attachment");
        let (width, height) = first.size();
        (width, height, first.format())
    }

    fn push_owned_pair(&mut self, device: &mut D, index: usize) -> Result<()> {
        let label = format!("HDR Color {index}");
        let color = device.create_color_target(&TargetDesc::new(
            &label,
            self.width,
            self.height,
            self.format,
        ))?;
        match device.create_depth_target(&format!("HDR Depth {index}"), self.width, self.height) {
            Ok(depth) => {
                self.colors.push(Attachment::Owned(color));
                self.depths.push(Attachment::Owned(depth));
                Ok(())
            }
            Err(e) => {
                device.destroy_texture(color);
                Err(e)
            }
        }
    }

    #[track_caller]
    fn check_index(&self, buffer_index: usize) {
        assert!(
            buffer_index < self.colors.len(),
            "buffer index {buffer_index} out of range for {} HDR buffers",
            self.colors.len()
        );
    }

    /// Sets the viewport and binds the color+depth pair of `buffer_index`.
    #[track_caller]
    pub fn bind(&self, device: &mut D, buffer_index: usize) {
        self.check_index(buffer_index);
        device.set_viewport(self.width, self.height);
        device.bind_targets(
            &[self.colors[buffer_index].get()],
            Some(self.depths[buffer_index].get()),
        );
    }

    /// Clears the color of `buffer_index` to `color` and its depth to 1.0.
    #[track_caller]
    pub fn clear(&self, device: &mut D, buffer_index: usize, color: [f32; 4]) {
        self.check_index(buffer_index);
        device.clear_color(self.colors[buffer_index].get(), color);
        device.clear_depth(self.depths[buffer_index].get(), 1.0);
    }

    /// Recreates the owned attachments at `width × height`. On failure the
    /// previous attachments stay valid.
    ///
    /// External color attachments have a fixed size, so a target holding any
    /// rejects a size change with [`LumenError::Config`]. Use
    /// [`replace_external_colors`](Self::replace_external_colors) instead.
    pub fn resize(&mut self, device: &mut D, width: u32, height: u32) -> Result<()> {
        if (width, height) != self.size() && self.colors.iter().any(Attachment::is_external) {
            return Err(LumenError::Config(format!(
                "cannot resize external HDR color attachments from {}x{} to {width}x{height}; \
                 replace them instead",
                self.width, self.height
            )));
        }
        self.recreate_at(device, width, height)
    }

    fn recreate_at(&mut self, device: &mut D, width: u32, height: u32) -> Result<()> {
        let mut colors = Vec::with_capacity(self.colors.len());
        let mut depths = Vec::with_capacity(self.depths.len());
        let created = self.recreate_owned(device, width, height, &mut colors, &mut depths);
        if let Err(e) = created {
            Self::release(device, colors, depths);
            return Err(e);
        }

        let old_colors = std::mem::replace(&mut self.colors, colors);
        let old_depths = std::mem::replace(&mut self.depths, depths);
        Self::release(device, old_colors, old_depths);
        self.width = width;
        self.height = height;
        log::debug!("HDR render target resized to {width}x{height}");
        Ok(())
    }

    fn recreate_owned(
        &self,
        device: &mut D,
        width: u32,
        height: u32,
        colors: &mut Vec<Attachment<D::Texture>>,
        depths: &mut Vec<Attachment<D::DepthTexture>>,
    ) -> Result<()> {
        for (i, color) in self.colors.iter().enumerate() {
            colors.push(match color {
                Attachment::External(t) => Attachment::External(t.clone()),
                Attachment::Owned(_) => Attachment::Owned(device.create_color_target(
                    &TargetDesc::new(&format!("HDR Color {i}"), width, height, self.format),
                )?),
            });
        }
        for (i, depth) in self.depths.iter().enumerate() {
            depths.push(match depth {
                Attachment::External(d) => Attachment::External(d.clone()),
                Attachment::Owned(_) => Attachment::Owned(device.create_depth_target(
                    &format!("HDR Depth {i}"),
                    width,
                    height,
                )?),
            });
        }
        Ok(())
    }

    /// Replaces the external color attachments, e.g. after the presentation
    /// buffers were recreated, and resizes the owned depth attachments.
    pub fn replace_external_colors(&mut self, device: &mut D, colors: Vec<D::Texture>) -> Result<()> {
        assert!(
            self.colors.iter().all(Attachment::is_external),
            "replace_external_colors on a target with owned color attachments"
        );
        assert_eq!(colors.len(), self.colors.len(), "buffer count cannot change");
        let (width, height, format) = Self::describe(&colors);
        self.colors = colors.into_iter().map(Attachment::External).collect();
        self.format = format;
        self.recreate_at(device, width, height)
    }

    fn release(
        device: &mut D,
        colors: Vec<Attachment<D::Texture>>,
        depths: Vec<Attachment<D::DepthTexture>>,
    ) {
        for color in colors {
            if let Attachment::Owned(t) = color {
                device.destroy_texture(t);
            }
        }
        for depth in depths {
            if let Attachment::Owned(d) = depth {
                device.destroy_depth(d);
            }
        }
    }

    #[track_caller]
    #[must_use]
    pub fn color(&self, buffer_index: usize) -> &D::Texture {
        self.check_index(buffer_index);
        self.colors[buffer_index].get()
    }

    #[track_caller]
    #[must_use]
    pub fn depth(&self, buffer_index: usize) -> &D::DepthTexture {
        self.check_index(buffer_index);
        self.depths[buffer_index].get()
    }

    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.colors.len()
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn format(&self) -> TargetFormat {
        self.format
    }

    /// Destroys owned attachments; external ones are left to their owner.
    pub fn destroy(self, device: &mut D) {
        Self::release(device, self.colors, self.depths);
    }
}
