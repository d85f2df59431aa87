/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Layer records, channel image data and the layer tree
//!
//! Layers are stored bottom to top. Groups are delimited by two records,
//! a bounding divider that opens the group (it comes first, below the
//! group's children) and the group record itself which closes it.
use log::{trace, warn};

use crate::bytestream::PSDReader;
use crate::color::ColorDecoder;
use crate::compression::RawChannelPlane;
use crate::constants::{
    CompressionMethod, PsdVersion, SectionDivider, CHANNEL_ID_LAYER_MASK,
    CHANNEL_ID_TRANSPARENCY, CHANNEL_ID_USER_MASK, LAYER_FLAG_HIDDEN, PSB_LONG_LENGTH_KEYS,
    SIGNATURE_8B64, SIGNATURE_8BIM
};
use crate::errors::PSDDecodeErrors;
use crate::mask::{apply_alpha_and_masks, LayerMask, MaskParameters};
use crate::options::PSDOptions;
use crate::surface::{DecodedSurface, Rect};
use crate::workers::map_blocks;

/// A layer or group of a document
#[derive(Clone, Debug, Default)]
pub struct LayerNode {
    /// Layer id from the `lyid` block, the record index when absent
    pub id:         u32,
    pub name:       String,
    pub visible:    bool,
    pub is_group:   bool,
    /// Four character blend key, e.g. `norm` or `pass`
    pub blend_mode: String,
    pub opacity:    u8,
    pub clipping:   bool,
    /// Document space rectangle, top left origin
    pub rect:       Rect,
    /// Decoded pixels, always `None` for groups
    pub surface:    Option<DecodedSurface>,
    /// Children, topmost first
    pub children:   Vec<LayerNode>
}

impl LayerNode {
    /// A visible root layer holding the merged image of a document
    pub fn background(surface: DecodedSurface) -> LayerNode {
        let (width, height) = surface.dimensions();
        LayerNode {
            id: 0,
            name: String::from("Background"),
            visible: true,
            blend_mode: String::from("norm"),
            opacity: 255,
            rect: Rect::new(0, 0, width as i32, height as i32),
            surface: Some(surface),
            ..LayerNode::default()
        }
    }

    /// Number of nodes in this subtree, self included
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(LayerNode::count).sum::<usize>()
    }
}

/// Everything needed to turn channel bytes into pixels
#[derive(Copy, Clone)]
pub(crate) struct LayerContext<'a> {
    pub version: PsdVersion,
    pub depth:   u16,
    /// `None` when the color mode cannot be converted
    pub color:   Option<ColorDecoder<'a>>,
    pub options: &'a PSDOptions
}

/// Result of parsing a layer info block
#[derive(Default)]
pub(crate) struct LayerInfo {
    pub roots:        Vec<LayerNode>,
    /// A negative layer count flags the first extra channel of the merged
    /// image as its transparency
    pub merged_alpha: bool,
    pub records:      usize
}

#[derive(Copy, Clone, Debug)]
struct ChannelInfo {
    id:     i16,
    length: usize
}

#[derive(Clone, Debug)]
struct LayerRecord {
    rect:        Rect,
    channels:    Vec<ChannelInfo>,
    blend_mode:  [u8; 4],
    opacity:     u8,
    clipping:    bool,
    flags:       u8,
    user_mask:   Option<MaskParameters>,
    layer_mask:  Option<MaskParameters>,
    name:        String,
    divider:     SectionDivider,
    layer_id:    Option<u32>
}

impl LayerRecord {
    fn mask_rect(&self, channel: i16) -> Rect {
        match channel {
            CHANNEL_ID_USER_MASK => self.user_mask.map(|m| m.rect).unwrap_or_default(),
            CHANNEL_ID_LAYER_MASK => self.layer_mask.map(|m| m.rect).unwrap_or_default(),
            _ => self.rect
        }
    }

    fn into_node(self, index: usize, surface: Option<DecodedSurface>) -> LayerNode {
        LayerNode {
            id: self.layer_id.unwrap_or(index as u32),
            name: self.name,
            visible: self.flags & LAYER_FLAG_HIDDEN == 0,
            is_group: matches!(
                self.divider,
                SectionDivider::OpenFolder | SectionDivider::ClosedFolder
            ),
            blend_mode: String::from_utf8_lossy(&self.blend_mode).into_owned(),
            opacity: self.opacity,
            clipping: self.clipping,
            rect: self.rect,
            surface,
            children: Vec::new()
        }
    }
}

/// Read an additional layer information block, `None` when the
/// signature is not one of `8BIM`/`8B64`.
///
/// Keys listed in [`PSB_LONG_LENGTH_KEYS`] carry 8 byte lengths in PSB files.
pub(crate) fn read_tagged_block<'a>(
    reader: &mut PSDReader<'a>, version: PsdVersion
) -> Result<Option<([u8; 4], &'a [u8])>, PSDDecodeErrors> {
    let start = reader.position();
    let signature = reader.read_fixed_bytes_or_error::<4>()?;

    if signature != SIGNATURE_8BIM && signature != SIGNATURE_8B64 {
        reader.set_position(start)?;
        return Ok(None);
    }
    let key = reader.read_fixed_bytes_or_error::<4>()?;

    let length = if version == PsdVersion::Psb && PSB_LONG_LENGTH_KEYS.contains(&&key) {
        reader.get_length(PsdVersion::Psb)?
    } else {
        reader.get_u32_be_err()? as usize
    };
    let data = reader.get_slice(length)?;

    // odd lengths are usually padded to even
    if length % 2 == 1 && !reader.eof() {
        let position = reader.position();
        if reader.get_u8_err()? == b'8' {
            reader.set_position(position)?;
        }
    }
    trace!("Tagged block {} ({length} bytes)", String::from_utf8_lossy(&key));

    Ok(Some((key, data)))
}

/// Parse the 20 or 36+ byte mask record, returning the user mask and
/// layer mask parameters
fn parse_mask_data(
    data: &[u8]
) -> Result<(Option<MaskParameters>, Option<MaskParameters>), PSDDecodeErrors> {
    if data.len() < 18 {
        return Ok((None, None));
    }
    let mut reader = PSDReader::new(data);

    let user = MaskParameters {
        rect:          reader.get_rect()?,
        default_color: reader.get_u8_err()?,
        flags:         reader.get_u8_err()?
    };
    if data.len() < 36 {
        return Ok((Some(user), None));
    }
    // mask parameters precede the real fields when bit 4 is set
    if user.flags & (1 << 4) != 0 {
        let parameters = reader.get_u8_err()?;
        for (bit, size) in [(0, 1), (1, 8), (2, 1), (3, 8)] {
            if parameters & (1 << bit) != 0 {
                reader.skip(size)?;
            }
        }
    }
    if reader.remaining() < 18 {
        return Ok((Some(user), None));
    }
    let flags = reader.get_u8_err()?;
    let default_color = reader.get_u8_err()?;
    let layer = MaskParameters {
        rect: reader.get_rect()?,
        default_color,
        flags
    };
    Ok((Some(user), Some(layer)))
}

/// Reject rectangles larger than the largest document we accept
fn check_rect(rect: Rect, ctx: &LayerContext) -> Result<Rect, PSDDecodeErrors> {
    let max_width = ctx.options.get_max_width().min(ctx.version.max_dimension());
    let max_height = ctx.options.get_max_height().min(ctx.version.max_dimension());

    if rect.width as usize > max_width {
        return Err(PSDDecodeErrors::LargeDimensions(max_width, rect.width as usize));
    }
    if rect.height as usize > max_height {
        return Err(PSDDecodeErrors::LargeDimensions(max_height, rect.height as usize));
    }
    Ok(rect)
}

fn parse_record(reader: &mut PSDReader, ctx: &LayerContext) -> Result<LayerRecord, PSDDecodeErrors> {
    let version = ctx.version;
    let rect = check_rect(reader.get_rect()?, ctx)?;
    let channel_count = reader.get_u16_be_err()?;

    let mut channels = Vec::with_capacity(usize::from(channel_count));
    for _ in 0..channel_count {
        let id = reader.get_i16_be_err()?;
        let length = reader.get_length(version)?;
        channels.push(ChannelInfo { id, length });
    }

    let signature = reader.read_fixed_bytes_or_error::<4>()?;
    if signature != SIGNATURE_8BIM {
        return Err(PSDDecodeErrors::BadSignature(signature));
    }
    let blend_mode = reader.read_fixed_bytes_or_error::<4>()?;
    let opacity = reader.get_u8_err()?;
    let clipping = reader.get_u8_err()? != 0;
    let flags = reader.get_u8_err()?;
    // filler
    reader.skip(1)?;

    let extra_length = reader.get_u32_be_err()? as usize;
    let mut extra = PSDReader::new(reader.get_slice(extra_length)?);

    let mask_length = extra.get_u32_be_err()? as usize;
    let (user_mask, layer_mask) = parse_mask_data(extra.get_slice(mask_length)?)?;
    for mask in user_mask.iter().chain(&layer_mask) {
        check_rect(mask.rect, ctx)?;
    }

    let ranges_length = extra.get_u32_be_err()? as usize;
    extra.skip(ranges_length)?;

    let mut record = LayerRecord {
        rect,
        channels,
        blend_mode,
        opacity,
        clipping,
        flags,
        user_mask,
        layer_mask,
        name: extra.get_pascal_string(4)?,
        divider: SectionDivider::Other,
        layer_id: None
    };

    while extra.remaining() >= 12 {
        let Some((key, data)) = read_tagged_block(&mut extra, version)? else {
            trace!("Stopping at unsigned data in layer {:?}", record.name);
            break;
        };
        let mut block = PSDReader::new(data);

        match &key {
            b"luni" => record.name = block.get_unicode_string()?,
            b"lsct" | b"lsdk" => {
                record.divider = SectionDivider::from_int(block.get_u32_be_err()?);
                if block.remaining() >= 8 {
                    block.skip(4)?;
                    record.blend_mode = block.read_fixed_bytes_or_error::<4>()?;
                }
            }
            b"lyid" => record.layer_id = Some(block.get_u32_be_err()?),
            _ => ()
        }
    }
    Ok(record)
}

/// Decode the pixels of one layer from its channels
fn decode_layer(
    record: &LayerRecord, channels: &[(i16, &[u8])], ctx: &LayerContext, options: &PSDOptions
) -> Result<Option<DecodedSurface>, PSDDecodeErrors> {
    if record.divider != SectionDivider::Other {
        return Ok(None);
    }
    let width = record.rect.width as usize;
    let height = record.rect.height as usize;

    let Some(color) = ctx.color else {
        return Ok(Some(DecodedSurface::new(width, height)));
    };
    if width == 0 || height == 0 {
        return Ok(Some(DecodedSurface::new(width, height)));
    }

    let mut planes = Vec::with_capacity(channels.len());

    for (id, data) in channels {
        // channels with only a compression tag, or nothing, carry no pixels
        if data.len() < 2 {
            continue;
        }
        let tag = u16::from_be_bytes([data[0], data[1]]);
        let compression =
            CompressionMethod::from_int(tag).ok_or(PSDDecodeErrors::UnknownCompression(tag))?;

        let plane = RawChannelPlane::decompress(
            compression,
            &data[2..],
            record.mask_rect(*id),
            ctx.depth,
            ctx.version,
            options
        )?;
        planes.push((*id, plane));
    }
    let find = |id: i16| {
        planes
            .iter()
            .find(|(channel, _)| *channel == id)
            .map(|(_, plane)| plane)
    };

    let color_planes: Vec<_> = (0..color.channels()).map(|c| find(c as i16)).collect();
    let mut surface = color.decode(&color_planes, width, height, options)?;

    let mask = |id: i16, params: Option<MaskParameters>| {
        let plane = find(id)?;
        let params = params?;
        (!plane.rect().is_empty()).then_some(LayerMask { params, plane })
    };

    apply_alpha_and_masks(
        &mut surface,
        record.rect,
        find(CHANNEL_ID_TRANSPARENCY),
        mask(CHANNEL_ID_USER_MASK, record.user_mask),
        mask(CHANNEL_ID_LAYER_MASK, record.layer_mask),
        options
    )?;

    Ok(Some(surface))
}

/// Parse a layer info block, the contents of the layer info section or
/// of an `Lr16`/`Lr32`/`Layr` tagged block.
pub(crate) fn parse_layer_info(
    reader: &mut PSDReader, ctx: &LayerContext
) -> Result<LayerInfo, PSDDecodeErrors> {
    if reader.remaining() < 2 {
        return Ok(LayerInfo::default());
    }
    let count = reader.get_i16_be_err()?;
    let merged_alpha = count < 0;
    let count = usize::from(count.unsigned_abs());

    trace!("Layer count: {count}");

    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(parse_record(reader, ctx)?);
    }

    // channel image data follows all records, in record order
    let mut layers = Vec::with_capacity(count);
    for record in records {
        let mut channels = Vec::with_capacity(record.channels.len());
        for info in &record.channels {
            channels.push((info.id, reader.get_slice(info.length)?));
        }
        layers.push((record, channels));
    }

    // layers decode in parallel, their rows then stay on one thread
    let blocks = ctx.options.get_num_threads();
    let inner = ctx
        .options
        .set_use_threads(ctx.options.get_use_threads() && (blocks <= 1 || layers.len() <= 1));

    let surfaces = map_blocks(&layers, blocks, ctx.options, |offset, block| {
        block
            .iter()
            .enumerate()
            .map(|(i, (record, channels))| {
                trace!("Decoding layer {} {:?}", offset + i, record.name);
                decode_layer(record, channels, ctx, &inner)
            })
            .collect::<Result<Vec<_>, PSDDecodeErrors>>()
    })?;

    let decoded = layers
        .into_iter()
        .map(|(record, _)| record)
        .zip(surfaces.into_iter().flatten());

    Ok(LayerInfo {
        roots: build_tree(decoded),
        merged_alpha,
        records: count
    })
}

/// Build the layer tree from records in file order (bottom to top)
fn build_tree(records: impl Iterator<Item = (LayerRecord, Option<DecodedSurface>)>) -> Vec<LayerNode> {
    let mut root = Vec::new();
    let mut open: Vec<Vec<LayerNode>> = Vec::new();

    for (index, (record, surface)) in records.enumerate() {
        match record.divider {
            SectionDivider::BoundingSection => open.push(Vec::new()),
            SectionDivider::OpenFolder | SectionDivider::ClosedFolder => {
                let mut children = open.pop().unwrap_or_else(|| {
                    warn!("Group {:?} has no bounding divider", record.name);
                    Vec::new()
                });
                children.reverse();

                let mut node = record.into_node(index, None);
                node.children = children;

                match open.last_mut() {
                    Some(parent) => parent.push(node),
                    None => root.push(node)
                }
            }
            SectionDivider::Other => {
                let node = record.into_node(index, surface);
                match open.last_mut() {
                    Some(parent) => parent.push(node),
                    None => root.push(node)
                }
            }
        }
    }
    // unterminated groups, hoist their layers
    while let Some(orphans) = open.pop() {
        warn!("Found {} layers in an unterminated group", orphans.len());
        match open.last_mut() {
            Some(parent) => parent.extend(orphans),
            None => root.extend(orphans)
        }
    }
    root.reverse();
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, divider: SectionDivider) -> LayerRecord {
        LayerRecord {
            rect: Rect::default(),
            channels: Vec::new(),
            blend_mode: *b"norm",
            opacity: 255,
            clipping: false,
            flags: 0,
            user_mask: None,
            layer_mask: None,
            name: name.to_string(),
            divider,
            layer_id: None
        }
    }

    #[test]
    fn tree_from_dividers() {
        // bottom to top: a, [ b, c ] group, d
        let records = vec![
            record("a", SectionDivider::Other),
            record("</group>", SectionDivider::BoundingSection),
            record("b", SectionDivider::Other),
            record("c", SectionDivider::Other),
            record("group", SectionDivider::OpenFolder),
            record("d", SectionDivider::Other),
        ];
        let roots = build_tree(records.into_iter().map(|r| (r, None)));

        let names: Vec<_> = roots.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["d", "group", "a"]);

        let group = &roots[1];
        assert!(group.is_group);
        let children: Vec<_> = group.children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(children, ["c", "b"]);
        assert_eq!(roots.iter().map(LayerNode::count).sum::<usize>(), 5);
    }

    #[test]
    fn unterminated_group_is_flattened() {
        let records = vec![
            record("</group>", SectionDivider::BoundingSection),
            record("a", SectionDivider::Other),
        ];
        let roots = build_tree(records.into_iter().map(|r| (r, None)));
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name, "a");
    }

    #[test]
    fn mask_record_fields() {
        let mut data = Vec::new();
        for v in [1_i32, 2, 3, 4] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        data.extend_from_slice(&[255, 0, 0, 0]);
        // 20 byte record only describes the user mask
        let (user, layer) = parse_mask_data(&data).unwrap();
        assert_eq!(user.unwrap().rect, Rect::from_edges(1, 2, 3, 4));
        assert_eq!(user.unwrap().default_color, 255);
        assert!(layer.is_none());

        data.truncate(18);
        data.extend_from_slice(&[4, 0]);
        for v in [0_i32, 0, 2, 2] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        let (_, layer) = parse_mask_data(&data).unwrap();
        let layer = layer.unwrap();
        assert_eq!(layer.rect, Rect::new(0, 0, 2, 2));
        assert!(layer.invert_on_blend());
    }

    #[test]
    fn tagged_block_lengths() {
        let mut data = Vec::new();
        data.extend_from_slice(b"8BIMlyid");
        data.extend_from_slice(&4_u32.to_be_bytes());
        data.extend_from_slice(&7_u32.to_be_bytes());
        data.extend_from_slice(b"8B64Lr16");
        data.extend_from_slice(&1_u64.to_be_bytes());
        data.push(9);

        let mut reader = PSDReader::new(&data);
        let (key, block) = read_tagged_block(&mut reader, PsdVersion::Psb)
            .unwrap()
            .unwrap();
        assert_eq!(&key, b"lyid");
        assert_eq!(block, 7_u32.to_be_bytes());

        let (key, block) = read_tagged_block(&mut reader, PsdVersion::Psb)
            .unwrap()
            .unwrap();
        assert_eq!(&key, b"Lr16");
        assert_eq!(block, [9]);
        assert!(reader.eof());
    }
}
