use std::path::Path;
use anyhow::{anyhow, Error};
use image::GrayImage;
use ndarray::{Array4, ArrayD, IxDyn};
use opencv::core::{self, Mat, Rect, Scalar, Size, Vector, CV_32F, CV_8UC1};
use opencv::dnn::{read_net_from_onnx, Net};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use parking_lot::Mutex;
use crate::inference::{CascadeParams, FaceBoxSource, InferenceModel};
use crate::processing::bbox::RawFaceBox;

fn path_str(path: &Path) -> Result<&str, Error> {
    path.to_str().ok_or_else(|| anyhow!("path {} is not valid UTF-8", path.display()))
}

/// Viola-Jones cascade face detector.
pub struct HaarCascadeDetector {
    classifier: Mutex<CascadeClassifier>,
}

impl HaarCascadeDetector {
    pub fn load(cascade_path: &Path) -> Result<Self, Error> {
        let classifier = CascadeClassifier::new(path_str(cascade_path)?)?;
        if classifier.empty()? {
            return Err(anyhow!("cascade {} could not be loaded", cascade_path.display()));
        }
        Ok(HaarCascadeDetector {
            classifier: Mutex::new(classifier),
        })
    }
}

impl FaceBoxSource for HaarCascadeDetector {
    fn detect(&self, gray: &GrayImage, params: &CascadeParams) -> Result<Vec<RawFaceBox>, Error> {
        let mut mat = Mat::new_rows_cols_with_default(
            gray.height() as i32,
            gray.width() as i32,
            CV_8UC1,
            Scalar::all(0.0),
        )?;
        mat.data_bytes_mut()?.copy_from_slice(gray.as_raw());

        let mut faces = Vector::<Rect>::new();
        let min_size = Size::new(params.min_size as i32, params.min_size as i32);
        self.classifier.lock().detect_multi_scale(
            &mat,
            &mut faces,
            params.scale_factor,
            params.min_neighbors,
            0,
            min_size,
            Size::default(),
        )?;

        Ok(faces
            .iter()
            .map(|r| RawFaceBox { x: r.x, y: r.y, w: r.width, h: r.height })
            .collect())
    }
}

/// ONNX network run through OpenCV's DNN module.
pub struct DnnModel {
    name: String,
    net: Mutex<Net>,
}

impl DnnModel {
    pub fn load(name: &str, model_path: &Path) -> Result<Self, Error> {
        let net = read_net_from_onnx(path_str(model_path)?)?;
        if net.empty()? {
            return Err(anyhow!("network {} has no layers", model_path.display()));
        }
        Ok(DnnModel {
            name: name.to_string(),
            net: Mutex::new(net),
        })
    }
}

impl InferenceModel for DnnModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, input: Array4<f32>) -> Result<ArrayD<f32>, Error> {
        let dims: Vec<i32> = input.shape().iter().map(|&d| d as i32).collect();
        let mut blob = Mat::new_nd_with_default(&dims, CV_32F, Scalar::all(0.0))?;
        let values = input.as_standard_layout();
        let values = values.as_slice().ok_or_else(|| anyhow!("input tensor is not contiguous"))?;
        blob.data_typed_mut::<f32>()?.copy_from_slice(values);

        let output = {
            let mut net = self.net.lock();
            net.set_input(&blob, "", 1.0, core::Scalar::default())?;
            net.forward_single("")?
        };

        let shape: Vec<usize> = output.mat_size().iter().map(|&d| d as usize).collect();
        let data = output.data_typed::<f32>()?.to_vec();
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), data)?)
    }
}
