use utoipa::{
    Modify, OpenApi,
    openapi::{
        self, OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{InventoryAdjustRequest, LowStockList, UpdateOrderStatusRequest},
        artists::{BecomeArtistRequest, BecomeArtistResponse, UpdateArtistProfileRequest},
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartItemDto, CartList},
        categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
        chat::{ChatMessageList, ConversationList, ConversationSummary, MarkedRead, SendMessageRequest},
        comments::{CommentList, CommentWithReplies, CreateCommentRequest, ReplyList},
        exhibitions::{CrawlSummary, ExhibitionList},
        favorites::{AddFavoriteRequest, FavoriteProductList},
        notifications::{NotificationList, UnreadCount},
        orders::{CheckoutRequest, OrderList, OrderWithDetails},
        payments::{PaymentLinkResponse, PaymentList, WebhookAck},
        products::{CreateProductRequest, ProductImageUpload, ProductList, UpdateProductRequest},
        reports::{GenerateReportRequest, ReportList},
        users::{UpdateProfileRequest, UserList},
    },
    integrations::payos::WebhookPayload,
    models::{
        ArtistProfile, CartItem, Category, ChatMessage, Comment, CommentReply, Exhibition,
        Favorite, FinancialReport, Notification, Order, OrderDetail, Payment, Product, User,
    },
    realtime::RealtimeEvent,
    response::{ApiResponse, Meta},
    routes::{
        admin, artists, auth, cart, categories, chat, comments, exhibitions, favorites, health,
        notifications, orders, params, payments, products, reports, users,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::current_user,
        users::list_users,
        users::get_user,
        users::update_profile,
        artists::become_artist,
        artists::update_profile,
        artists::get_profile,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::upload_image,
        products::watermarked_image,
        products::list_comments,
        products::create_comment,
        comments::delete_comment,
        comments::list_replies,
        comments::reply_to_comment,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        favorites::list_favorites,
        favorites::add_favorite,
        favorites::remove_favorite,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::cancel_order,
        orders::download_certificate,
        orders::download_artwork,
        payments::create_payment_link,
        payments::list_payments,
        payments::payos_webhook,
        chat::send_message,
        chat::list_conversations,
        chat::conversation,
        chat::mark_read,
        notifications::list_notifications,
        notifications::unread_count,
        notifications::mark_read,
        notifications::mark_all_read,
        notifications::stream,
        reports::generate_report,
        reports::list_reports,
        exhibitions::list_exhibitions,
        exhibitions::crawl_exhibitions,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_low_stock,
        admin::adjust_inventory,
    ),
    components(
        schemas(
            User,
            ArtistProfile,
            Category,
            Product,
            Favorite,
            CartItem,
            Order,
            OrderDetail,
            Payment,
            Comment,
            CommentReply,
            ChatMessage,
            Notification,
            FinancialReport,
            Exhibition,
            RealtimeEvent,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UpdateProfileRequest,
            UserList,
            BecomeArtistRequest,
            BecomeArtistResponse,
            UpdateArtistProfileRequest,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CategoryList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            ProductImageUpload,
            CreateCommentRequest,
            CommentWithReplies,
            CommentList,
            ReplyList,
            AddToCartRequest,
            CartItemDto,
            CartList,
            AddFavoriteRequest,
            FavoriteProductList,
            CheckoutRequest,
            OrderList,
            OrderWithDetails,
            PaymentLinkResponse,
            PaymentList,
            WebhookPayload,
            WebhookAck,
            SendMessageRequest,
            ChatMessageList,
            ConversationSummary,
            ConversationList,
            MarkedRead,
            NotificationList,
            UnreadCount,
            GenerateReportRequest,
            ReportList,
            ExhibitionList,
            CrawlSummary,
            UpdateOrderStatusRequest,
            InventoryAdjustRequest,
            LowStockList,
            params::Pagination,
            params::SortOrder,
            params::ProductSortBy,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithDetails>,
            ApiResponse<OrderList>,
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Users", description = "User accounts"),
        (name = "Artists", description = "Artist profiles"),
        (name = "Categories", description = "Artwork categories"),
        (name = "Products", description = "Artworks and their images"),
        (name = "Comments", description = "Comments and replies on artworks"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Favorites", description = "Favorite endpoints"),
        (name = "Orders", description = "Orders, certificates and downloads"),
        (name = "Payments", description = "PayOS payment links and webhook"),
        (name = "Chat", description = "Direct messages"),
        (name = "Notifications", description = "Notifications and the live event stream"),
        (name = "Reports", description = "Artist financial reports"),
        (name = "Exhibitions", description = "Crawled gallery exhibitions"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
