//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate for single-band grids with pixel-scale/tiepoint
//! georeferencing, an EPSG code in the GeoKey directory and the
//! GDAL_NODATA tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType, Gray32Float, Gray8};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

/// Tag for a numeric code. Codes the `tiff` crate knows by name (the GeoTIFF
/// and GDAL tags among them) resolve to that named variant, which is how the
/// decoder keys them.
fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Sentinel written for NaN cells when the raster declares none
    pub fallback_nodata: Option<f64>,
}

/// Read a single-band GeoTIFF file into a raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read a GeoTIFF from an in-memory buffer
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    decode_geotiff(Cursor::new(data))
}

fn cast_all<S, T>(buf: &[S]) -> Vec<T>
where
    S: Copy + num_traits::NumCast,
    T: RasterElement,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)
        .map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(&buf),
        DecodingResult::F64(buf) => cast_all(&buf),
        DecodingResult::U8(buf) => cast_all(&buf),
        DecodingResult::U16(buf) => cast_all(&buf),
        DecodingResult::U32(buf) => cast_all(&buf),
        DecodingResult::I8(buf) => cast_all(&buf),
        DecodingResult::I16(buf) => cast_all(&buf),
        DecodingResult::I32(buf) => cast_all(&buf),
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    // Multi-band files decode interleaved; only single-band grids are accepted
    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(read_nodata(&mut decoder).and_then(num_traits::cast));

    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(geo_tag(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(geo_tag(MODEL_TIEPOINT)).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(geo_tag(GEO_KEY_DIRECTORY)).ok()?;
    if keys.len() < 4 {
        return None;
    }

    // [version, revision, minor, count, (id, location, count, value)*]
    let num_keys = keys[3] as usize;
    keys[4..]
        .chunks_exact(4)
        .take(num_keys)
        .find(|k| (k[0] == KEY_PROJECTED_CS_TYPE || k[0] == KEY_GEOGRAPHIC_TYPE) && k[1] == 0 && k[3] > 0)
        .map(|k| CRS::from_epsg(k[3] as u32))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(geo_tag(GDAL_NODATA)).ok()?;
    let text = text.trim_end_matches('\0').trim();
    if text.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    text.parse::<f64>().ok()
}

/// Write an elevation or metric raster as 32-bit float GeoTIFF.
///
/// NaN cells are written as the raster's declared sentinel (or the fallback
/// in `options`), which is also stored in the GDAL_NODATA tag.
pub fn write_geotiff<P: AsRef<Path>>(
    raster: &Raster<f64>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()> {
    let file = BufWriter::new(File::create(path.as_ref())?);
    encode_float(raster, file, &options.unwrap_or_default())
}

/// Same as [`write_geotiff`] into an in-memory buffer
pub fn write_geotiff_to_buffer(raster: &Raster<f64>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_float(raster, Cursor::new(&mut buf), &options.unwrap_or_default())?;
    Ok(buf)
}

/// Write a categorical raster (classification, masks) as 8-bit GeoTIFF
pub fn write_mask_geotiff<P: AsRef<Path>>(raster: &Raster<u8>, path: P) -> Result<()> {
    let file = BufWriter::new(File::create(path.as_ref())?);
    encode_u8(raster, file)
}

/// Same as [`write_mask_geotiff`] into an in-memory buffer
pub fn write_mask_geotiff_to_buffer(raster: &Raster<u8>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_u8(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_float<W: Write + Seek>(raster: &Raster<f64>, writer: W, options: &GeoTiffOptions) -> Result<()> {
    let sentinel = raster
        .nodata()
        .filter(|nd| !nd.is_nan())
        .or(options.fallback_nodata);

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| match (v.is_nan(), sentinel) {
            (true, Some(nd)) => nd as f32,
            _ => v as f32,
        })
        .collect();

    let nodata_text = match sentinel {
        Some(nd) => nd.to_string(),
        None => "nan".to_string(),
    };
    encode::<Gray32Float, _, _>(raster, writer, &data, &nodata_text)
}

fn encode_u8<W: Write + Seek>(raster: &Raster<u8>, writer: W) -> Result<()> {
    let data: Vec<u8> = raster.data().iter().copied().collect();
    let nodata_text = raster.nodata().unwrap_or(u8::default_nodata()).to_string();
    encode::<Gray8, _, _>(raster, writer, &data, &nodata_text)
}

fn encode<C, T, W>(raster: &Raster<T>, writer: W, data: &[C::Inner], nodata_text: &str) -> Result<()>
where
    C: ColorType,
    [C::Inner]: tiff::encoder::TiffValue,
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();
    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(geo_tag(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(geo_tag(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    let geokeys = geokey_directory(raster.crs());
    image
        .encoder()
        .write_tag(geo_tag(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    image
        .encoder()
        .write_tag(geo_tag(GDAL_NODATA), nodata_text)
        .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;

    image
        .write_data(data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

/// GeoKeyDirectory with model type, raster type and, when known, the EPSG code
fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs
        .and_then(|c| c.epsg())
        .filter(|&code| code <= u16::MAX as u32);
    let geographic = crs.is_some_and(|c| c.is_geographic());

    let mut keys: Vec<u16> = vec![
        KEY_MODEL_TYPE, 0, 1, if geographic { 2 } else { 1 },
        KEY_RASTER_TYPE, 0, 1, 1, // RasterPixelIsArea
    ];
    if let Some(code) = epsg {
        let key = if geographic { KEY_GEOGRAPHIC_TYPE } else { KEY_PROJECTED_CS_TYPE };
        keys.extend_from_slice(&[key, 0, 1, code as u16]);
    }

    let mut dir = vec![1, 1, 0, (keys.len() / 4) as u16];
    dir.extend(keys);
    dir
}
