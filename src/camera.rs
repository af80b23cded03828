// Opens a webcam and hands grayscale frames to the tracker.
// Each `next_gray_frame()` blocks until the camera delivers, then converts RGB to luma.

use log::info;
// Bring in nokhwa types for camera control.
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};

use crate::error::{Error, Result};
use crate::tracker::FrameSource;
use crate::types::Frame;

// A small wrapper around nokhwa::Camera so the tracker only sees `FrameSource`.
pub struct CameraCapture {
    cam: Camera,
    width: u32,
    height: u32,
}

impl CameraCapture {
    /// Open camera `index` near the requested resolution (falls back if not exact).
    pub fn new(index: u32, width: u32, height: u32) -> Result<Self> {
        // 1) Choose the device (0 = default webcam)
        let idx = CameraIndex::Index(index);

        let fmt = CameraFormat::new(
            Resolution::new(width, height),
            FrameFormat::YUYV, // uncompressed; cheap to convert
            30,                // target FPS
        );

        // 2) Ask for RGB frames closest to our request; we reduce to gray ourselves.
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        // 3) Create the camera (this might fail if no device exists).
        let mut cam = Camera::new(idx, req)
            .map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;

        // 4) Start streaming frames from the camera.
        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        // 5) The actual stream might choose a slightly different resolution.
        let actual = cam.resolution();
        info!(
            "camera {index} streaming at {}x{}",
            actual.width(),
            actual.height()
        );

        Ok(Self {
            cam,
            width: actual.width(),
            height: actual.height(),
        })
    }

    /// Report the actual resolution the camera is delivering.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl FrameSource for CameraCapture {
    /// A live camera never reports end-of-stream; capture failures are errors.
    fn next_gray_frame(&mut self) -> Result<Option<Frame>> {
        // 1) Pull a frame from the camera (blocks until a new frame is ready).
        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;

        // 2) Decode to RGB (handles the various raw formats safely).
        let rgb_img = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;

        // 3) Reduce to 8-bit luma (BT.601 weights).
        let (w, h) = rgb_img.dimensions();
        let mut gray = Vec::with_capacity((w as usize) * (h as usize));
        for (_x, _y, pixel) in rgb_img.enumerate_pixels() {
            let r = pixel[0] as u32;
            let g = pixel[1] as u32;
            let b = pixel[2] as u32;
            gray.push(((299 * r + 587 * g + 114 * b + 500) / 1000) as u8);
        }

        let frame = Frame::from_raw(w, h, gray)
            .ok_or_else(|| Error::CameraFrame("gray buffer size mismatch".into()))?;
        Ok(Some(frame))
    }
}
