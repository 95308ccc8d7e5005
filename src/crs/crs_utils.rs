use anyhow::anyhow;

pub type EpsgCode = u32;

/// EPSG code of WGS 84, the CRS of all data served by the OSM APIs.
pub const WGS84_EPSG_CODE: EpsgCode = 4326;

pub fn spatial_ref_from_epsg(code: EpsgCode) -> anyhow::Result<gdal::spatial_ref::SpatialRef> {
    gdal::spatial_ref::SpatialRef::from_epsg(code)
        .map_err(|err| anyhow!("Could not create SpatialRef from EPSG code {}. {}", code, err))
}

/// Read the EPSG code of a spatial ref, e.g. the one attached to a layer of a geofile.
pub fn epsg_code_of(spatial_ref: &gdal::spatial_ref::SpatialRef) -> anyhow::Result<EpsgCode> {
    let code = spatial_ref.auth_code()?;
    EpsgCode::try_from(code).map_err(|_| anyhow!("Invalid EPSG authority code {}", code))
}

pub fn epsg_code_to_authority_string(code: EpsgCode) -> String {
    format!("EPSG:{}", code)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{epsg_code_of, epsg_code_to_authority_string, spatial_ref_from_epsg, EpsgCode};

    #[rstest]
    #[case(4326)]
    #[case(32654)] // WGS 84 / UTM zone 54N
    #[case(25832)] // ETRS89 / UTM zone 32N
    fn test_epsg_code_survives_spatial_ref(#[case] code: EpsgCode) {
        let spatial_ref = spatial_ref_from_epsg(code).unwrap();
        assert_eq!(code, epsg_code_of(&spatial_ref).unwrap());
    }

    #[test]
    fn test_authority_string() {
        assert_eq!("EPSG:4326", epsg_code_to_authority_string(4326));
    }
}
